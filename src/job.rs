//! Bloom job specification and metadata.
//!
//! Offline jobs are described in JSON: a single image job, or a batch of
//! jobs run on one GPU context. Completed jobs can write a metadata file
//! next to their output.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::effects::gaussian_blur::normalize_kernel_width;
use crate::params::{BLOOM_KERNEL_WIDTH, BLOOM_SIGMA, BLOOM_THRESHOLD};

fn default_threshold() -> f32 {
    BLOOM_THRESHOLD.default
}

fn default_kernel_width() -> u32 {
    BLOOM_KERNEL_WIDTH.default as u32
}

fn default_sigma() -> f32 {
    BLOOM_SIGMA.default
}

/// Tunable bloom parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloomSettings {
    /// Luminance above which texels glow.
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Gaussian kernel width in low-res texels. Forced odd.
    #[serde(default = "default_kernel_width")]
    pub kernel_width: u32,

    /// Gaussian standard deviation in low-res texels.
    #[serde(default = "default_sigma")]
    pub sigma: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            kernel_width: default_kernel_width(),
            sigma: default_sigma(),
        }
    }
}

impl BloomSettings {
    /// Clamp parameters to safe ranges.
    ///
    /// The kernel width may exceed the UI range up to the blur's maximum.
    pub fn sanitize(&self) -> Self {
        Self {
            threshold: BLOOM_THRESHOLD.clamp(self.threshold),
            kernel_width: normalize_kernel_width(self.kernel_width),
            sigma: BLOOM_SIGMA.clamp(self.sigma),
        }
    }

    /// Float parameter by its definition name.
    pub fn float_param_mut(&mut self, name: &str) -> Option<&mut f32> {
        match name {
            n if n == BLOOM_THRESHOLD.name => Some(&mut self.threshold),
            n if n == BLOOM_SIGMA.name => Some(&mut self.sigma),
            _ => None,
        }
    }

    /// Integer parameter by its definition name.
    pub fn int_param(&self, name: &str) -> Option<i32> {
        (name == BLOOM_KERNEL_WIDTH.name).then(|| self.kernel_width.min(i32::MAX as u32) as i32)
    }

    /// Sets an integer parameter; unknown names are ignored.
    pub fn set_int_param(&mut self, name: &str, value: i32) {
        if name == BLOOM_KERNEL_WIDTH.name {
            self.kernel_width = value.max(1) as u32;
        }
    }
}

/// Texture format images are processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkingFormat {
    /// Pixel values are used as stored.
    #[default]
    Rgba8Unorm,
    /// Pixel values are linearized before filtering and re-encoded on write.
    Rgba8UnormSrgb,
}

impl WorkingFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            WorkingFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            WorkingFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }
}

impl std::str::FromStr for WorkingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba8unorm" | "unorm" | "linear" => Ok(WorkingFormat::Rgba8Unorm),
            "rgba8unormsrgb" | "srgb" => Ok(WorkingFormat::Rgba8UnormSrgb),
            other => Err(format!("Unknown working format: {}", other)),
        }
    }
}

/// Specification for a single bloom job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloomJobSpec {
    /// Image to read.
    pub input_path: PathBuf,

    /// Image to write. The encoding follows the extension.
    pub output_path: PathBuf,

    #[serde(default)]
    pub settings: BloomSettings,

    #[serde(default)]
    pub format: WorkingFormat,

    /// Whether to write `<output stem>.metadata.json` next to the output.
    #[serde(default)]
    pub write_metadata: bool,
}

impl BloomJobSpec {
    /// Create a job with default settings.
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            output_path,
            settings: BloomSettings::default(),
            format: WorkingFormat::default(),
            write_metadata: false,
        }
    }

    /// Load a job spec from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read job file {:?}: {}", path, e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse job file {:?}: {}", path, e))
    }

    /// Validate the job specification.
    pub fn validate(&self) -> Result<(), String> {
        if !self.input_path.exists() {
            return Err(format!("Input file not found: {:?}", self.input_path));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err("Output path cannot be empty".to_string());
        }
        if self.output_path.extension().is_none() {
            return Err(format!("Output path has no image extension: {:?}", self.output_path));
        }
        if !self.settings.threshold.is_finite() || self.settings.threshold < 0.0 {
            return Err("Threshold must be a non-negative number".to_string());
        }
        if !self.settings.sigma.is_finite() || self.settings.sigma <= 0.0 {
            return Err("Sigma must be positive".to_string());
        }
        if self.settings.kernel_width == 0 {
            return Err("Kernel width must be positive".to_string());
        }
        Ok(())
    }

    /// Where the metadata file for this job goes.
    pub fn metadata_path(&self) -> PathBuf {
        let stem = self
            .output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        self.output_path.with_file_name(format!("{}.metadata.json", stem))
    }
}

/// Specification for a batch of bloom jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJobSpec {
    /// Batch identifier.
    pub batch_id: String,

    /// Jobs, run in order.
    pub jobs: Vec<BloomJobSpec>,

    /// Keep going after a failed job instead of aborting the batch.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl BatchJobSpec {
    /// Load a batch spec from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read batch file {:?}: {}", path, e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse batch file {:?}: {}", path, e))
    }

    /// Validate the batch.
    ///
    /// With `continue_on_error` set, jobs are only checked when they run, so a
    /// bad job fails on its own instead of rejecting the whole batch.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_id.is_empty() {
            return Err("Batch ID cannot be empty".to_string());
        }
        if self.jobs.is_empty() {
            return Err("Batch must contain at least one job".to_string());
        }
        if self.continue_on_error {
            return Ok(());
        }
        for (i, job) in self.jobs.iter().enumerate() {
            job.validate().map_err(|e| format!("Job {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// Metadata for a completed bloom job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloomMetadata {
    /// The job specification used, with sanitized settings.
    pub job: BloomJobSpec,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    pub duration_secs: f64,

    /// SHA-256 hash of the input file.
    pub input_hash: String,

    pub width: u32,

    pub height: u32,

    pub low_res_width: u32,

    pub low_res_height: u32,

    pub gpu_adapter: String,

    pub glowpass_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl BloomMetadata {
    /// Compute SHA-256 hash of file content.
    pub fn hash_file(path: &Path) -> Result<String, std::io::Error> {
        use std::io::Read;

        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Save metadata to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize metadata: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write metadata: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("glowpass-job-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_settings_defaults_from_json() {
        let settings: BloomSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, BloomSettings::default());
        assert_eq!(settings.threshold, 0.8);
        assert_eq!(settings.kernel_width, 5);
        assert_eq!(settings.sigma, 2.0);
    }

    #[test]
    fn test_settings_camel_case() {
        let settings: BloomSettings = serde_json::from_str(r#"{"kernelWidth": 9, "sigma": 3.5}"#).unwrap();
        assert_eq!(settings.kernel_width, 9);
        assert_eq!(settings.sigma, 3.5);
        assert_eq!(settings.threshold, 0.8);
    }

    #[test]
    fn test_settings_sanitize() {
        let settings = BloomSettings {
            threshold: -1.0,
            kernel_width: 40,
            sigma: 0.0,
        }
        .sanitize();
        assert_eq!(settings.threshold, 0.0);
        assert_eq!(settings.kernel_width, 31);
        assert_eq!(settings.sigma, 0.001);

        let even = BloomSettings {
            kernel_width: 8,
            ..Default::default()
        };
        assert_eq!(even.sanitize().kernel_width, 9);
    }

    #[test]
    fn test_params_addressed_by_name() {
        let mut settings = BloomSettings::default();
        if let Some(t) = settings.float_param_mut("threshold") {
            *t = 0.25;
        }
        assert_eq!(settings.threshold, 0.25);
        assert!(settings.float_param_mut("kernelWidth").is_none());

        assert_eq!(settings.int_param("kernelWidth"), Some(5));
        assert_eq!(settings.int_param("sigma"), None);
        settings.set_int_param("kernelWidth", -3);
        assert_eq!(settings.kernel_width, 1);
        settings.set_int_param("sigma", 9);
        assert_eq!(settings.sigma, 2.0);
    }

    #[test]
    fn test_working_format_parse() {
        assert_eq!("srgb".parse::<WorkingFormat>().unwrap(), WorkingFormat::Rgba8UnormSrgb);
        assert_eq!("Rgba8Unorm".parse::<WorkingFormat>().unwrap(), WorkingFormat::Rgba8Unorm);
        assert!("bgra".parse::<WorkingFormat>().is_err());
        assert_eq!(
            WorkingFormat::Rgba8UnormSrgb.texture_format(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }

    #[test]
    fn test_job_spec_validation() {
        let spec = BloomJobSpec::new(PathBuf::from("/nonexistent/in.png"), PathBuf::from("out.png"));
        assert!(spec.validate().is_err());

        let input = temp_path("valid.png");
        std::fs::write(&input, b"not really a png").unwrap();
        let mut spec = BloomJobSpec::new(input.clone(), PathBuf::from("out.png"));
        assert!(spec.validate().is_ok());

        spec.settings.sigma = 0.0;
        assert!(spec.validate().is_err());

        spec.settings.sigma = 2.0;
        spec.output_path = PathBuf::from("out");
        assert!(spec.validate().is_err());

        std::fs::remove_file(input).ok();
    }

    #[test]
    fn test_metadata_path_next_to_output() {
        let spec = BloomJobSpec::new(PathBuf::from("in.png"), PathBuf::from("/tmp/renders/frame.png"));
        assert_eq!(spec.metadata_path(), PathBuf::from("/tmp/renders/frame.metadata.json"));
    }

    #[test]
    fn test_batch_spec_parse_and_validate() {
        let json = r#"{
            "batchId": "nightly",
            "jobs": [
                { "inputPath": "/nonexistent/a.png", "outputPath": "a_out.png", "settings": { "threshold": 0.5 } }
            ]
        }"#;
        let batch: BatchJobSpec = serde_json::from_str(json).unwrap();
        assert_eq!(batch.batch_id, "nightly");
        assert!(!batch.continue_on_error);
        assert_eq!(batch.jobs[0].settings.threshold, 0.5);
        assert_eq!(batch.jobs[0].format, WorkingFormat::Rgba8Unorm);

        let err = batch.validate().unwrap_err();
        assert!(err.starts_with("Job 0:"), "{}", err);

        let lenient = BatchJobSpec {
            continue_on_error: true,
            ..batch.clone()
        };
        assert!(lenient.validate().is_ok());

        let empty = BatchJobSpec {
            batch_id: "x".to_string(),
            jobs: Vec::new(),
            continue_on_error: true,
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_hash_file() {
        let path = temp_path("hash.txt");
        std::fs::write(&path, b"abc").unwrap();
        let hash = BloomMetadata::hash_file(&path).unwrap();
        assert_eq!(hash, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        std::fs::remove_file(path).ok();
    }
}
