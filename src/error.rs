//! Structured errors for effect execution.

/// Stage in which an effect operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectPhase {
    GpuSetup,
    ResourceCreation,
    Blit,
    Filter,
    Blur,
    Composite,
    Readback,
    ImageIo,
    JobConfig,
}

impl std::fmt::Display for EffectPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectPhase::GpuSetup => write!(f, "GPU Setup"),
            EffectPhase::ResourceCreation => write!(f, "Resource Creation"),
            EffectPhase::Blit => write!(f, "Blit"),
            EffectPhase::Filter => write!(f, "Filter"),
            EffectPhase::Blur => write!(f, "Blur"),
            EffectPhase::Composite => write!(f, "Composite"),
            EffectPhase::Readback => write!(f, "Readback"),
            EffectPhase::ImageIo => write!(f, "Image I/O"),
            EffectPhase::JobConfig => write!(f, "Job Config"),
        }
    }
}

/// Error raised by GPU resource management and effect passes.
#[derive(Debug)]
pub struct EffectError {
    pub phase: EffectPhase,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for EffectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for EffectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl EffectError {
    pub fn new(phase: EffectPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        phase: EffectPhase,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            phase,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type Result<T> = std::result::Result<T, EffectError>;
