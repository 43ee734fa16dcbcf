use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::effects::{kernel_weights, low_res_size, Bloom};
use crate::error::{EffectError, EffectPhase};
use crate::gpu::{readback, Fbo, GpuContext, RenderContext, Texture, SHADER_RESOURCE_RENDER_TARGET};
use crate::job::{BatchJobSpec, BloomJobSpec, BloomMetadata, WorkingFormat};
use crate::profiling::{set_profiling_enabled, timed};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply bloom to a single image
    Apply {
        /// Input image
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output image; the encoding follows the extension
        #[arg(long)]
        out: Option<PathBuf>,

        /// Luminance threshold
        #[arg(long)]
        threshold: Option<f32>,

        /// Gaussian kernel width (odd, at most 31)
        #[arg(long)]
        kernel_width: Option<u32>,

        /// Gaussian sigma
        #[arg(long)]
        sigma: Option<f32>,

        /// Working format: "unorm" or "srgb"
        #[arg(long)]
        format: Option<WorkingFormat>,

        /// Job JSON file; command line values override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write <out>.metadata.json next to the output
        #[arg(long)]
        metadata: bool,

        /// Log stage timings
        #[arg(long)]
        profile: bool,
    },

    /// Run a batch of jobs from a JSON file
    Batch {
        #[arg(long)]
        file: PathBuf,

        /// Log stage timings
        #[arg(long)]
        profile: bool,
    },

    /// Print normalized Gaussian weights, center first
    Kernel {
        #[arg(long, default_value_t = 5)]
        kernel_width: u32,

        #[arg(long, default_value_t = 2.0)]
        sigma: f32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            input,
            out,
            threshold,
            kernel_width,
            sigma,
            format,
            config,
            metadata,
            profile,
        } => {
            set_profiling_enabled(profile);
            let mut job = match config {
                Some(path) => BloomJobSpec::from_file(&path).map_err(anyhow::Error::msg)?,
                None => {
                    let input = input.clone().ok_or_else(|| anyhow::anyhow!("--input is required without --config"))?;
                    let out = out.clone().ok_or_else(|| anyhow::anyhow!("--out is required without --config"))?;
                    BloomJobSpec::new(input, out)
                }
            };
            if let Some(input) = input {
                job.input_path = input;
            }
            if let Some(out) = out {
                job.output_path = out;
            }
            if let Some(t) = threshold {
                job.settings.threshold = t;
            }
            if let Some(k) = kernel_width {
                job.settings.kernel_width = k;
            }
            if let Some(s) = sigma {
                job.settings.sigma = s;
            }
            if let Some(f) = format {
                job.format = f;
            }
            job.write_metadata |= metadata;

            let gpu = pollster::block_on(GpuContext::headless())?;
            log::info!("Using adapter {}", gpu.adapter_name());
            let mut bloom = Bloom::from_settings(&gpu, &job.settings);
            run_job(&gpu, &mut bloom, &job)?;
            println!("Wrote {:?}", job.output_path);
        }
        Commands::Batch { file, profile } => {
            set_profiling_enabled(profile);
            run_batch_file(&file)?;
        }
        Commands::Kernel { kernel_width, sigma } => {
            let weights = kernel_weights(kernel_width, sigma);
            for (offset, w) in weights.iter().enumerate() {
                println!("{:>3} {:.6}", offset, w);
            }
        }
    }
    Ok(())
}

fn run_batch_file(file: &Path) -> Result<()> {
    let batch = BatchJobSpec::from_file(file).map_err(anyhow::Error::msg)?;
    let gpu = pollster::block_on(GpuContext::headless())?;
    let outcome = run_batch(&gpu, &batch)?;
    if outcome.failed > 0 {
        anyhow::bail!("{} of {} jobs failed", outcome.failed, batch.jobs.len());
    }
    println!("Batch {} done.", batch.batch_id);
    Ok(())
}

/// Counts of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs every job of `batch` in order on one `Bloom`.
///
/// A failing job aborts the batch unless `continue_on_error` is set, in which
/// case it is logged and counted.
pub fn run_batch(gpu: &GpuContext, batch: &BatchJobSpec) -> crate::Result<BatchOutcome> {
    batch
        .validate()
        .map_err(|e| EffectError::new(EffectPhase::JobConfig, e))?;
    log::info!("Batch {}: {} jobs on {}", batch.batch_id, batch.jobs.len(), gpu.adapter_name());

    // One effect for the whole batch, so equal-sized inputs share the low-res texture.
    let mut bloom = Bloom::from_settings(gpu, &batch.jobs[0].settings);
    let mut outcome = BatchOutcome { succeeded: 0, failed: 0 };
    for (i, job) in batch.jobs.iter().enumerate() {
        println!("[{}/{}] {:?}", i + 1, batch.jobs.len(), job.input_path);
        match run_job(gpu, &mut bloom, job) {
            Ok(_) => outcome.succeeded += 1,
            Err(e) if batch.continue_on_error => {
                log::error!("Job {} failed: {}", i, e);
                outcome.failed += 1;
            }
            Err(e) => {
                return Err(EffectError::with_source(e.phase, format!("job {} failed", i), e));
            }
        }
    }
    Ok(outcome)
}

/// Result of one processed image.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub width: u32,
    pub height: u32,
    pub low_res_width: u32,
    pub low_res_height: u32,
    pub metadata_path: Option<PathBuf>,
}

/// Loads, blooms and saves the image described by `job`.
///
/// `bloom` is reconfigured with the job's settings; its working textures are
/// reused across calls when sizes match.
pub fn run_job(gpu: &GpuContext, bloom: &mut Bloom, job: &BloomJobSpec) -> crate::Result<JobOutcome> {
    job.validate().map_err(|e| EffectError::new(EffectPhase::JobConfig, e))?;
    let started_at = Utc::now();
    let start = std::time::Instant::now();
    let mut warnings = Vec::new();

    let settings = job.settings.sanitize();
    if settings != job.settings {
        warnings.push(format!("settings adjusted to {:?}", settings));
    }
    bloom.apply_settings(&settings);
    log::info!("Bloom {:?} -> {:?} ({:?})", job.input_path, job.output_path, settings);

    let decoded = timed("decode", || image::open(&job.input_path))
        .map_err(|e| EffectError::with_source(EffectPhase::ImageIo, format!("failed to read {:?}", job.input_path), e))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();

    let format = job.format.texture_format();
    if !gpu.supports_effect_format(format) {
        return Err(EffectError::new(
            EffectPhase::GpuSetup,
            format!("{:?} cannot be filtered and rendered on {}", format, gpu.adapter_name()),
        ));
    }

    let frame = Arc::new(Texture::from_rgba8(
        gpu,
        "Frame",
        width,
        height,
        format,
        SHADER_RESOURCE_RENDER_TARGET | wgpu::TextureUsages::COPY_SRC,
        decoded.as_raw(),
    )?);
    let fbo = Fbo::with_color(Arc::clone(&frame))?;

    timed("bloom", || -> crate::Result<()> {
        let mut ctx = RenderContext::new(gpu, "Bloom Job");
        bloom.execute(&mut ctx, &fbo)?;
        ctx.submit();
        Ok(())
    })?;

    let pixels = timed("readback", || readback::read_rgba8(gpu, &frame))?;

    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EffectError::with_source(EffectPhase::ImageIo, format!("failed to create {:?}", parent), e)
            })?;
        }
    }
    timed("encode", || image::save_buffer(&job.output_path, &pixels, width, height, image::ColorType::Rgba8))
        .map_err(|e| EffectError::with_source(EffectPhase::ImageIo, format!("failed to write {:?}", job.output_path), e))?;

    let (low_res_width, low_res_height) = low_res_size(width, height);
    let mut outcome = JobOutcome {
        width,
        height,
        low_res_width,
        low_res_height,
        metadata_path: None,
    };

    if job.write_metadata {
        let input_hash = BloomMetadata::hash_file(&job.input_path)
            .map_err(|e| EffectError::with_source(EffectPhase::ImageIo, "failed to hash input", e))?;
        let mut recorded = job.clone();
        recorded.settings = settings;
        let metadata = BloomMetadata {
            job: recorded,
            started_at,
            completed_at: Utc::now(),
            duration_secs: start.elapsed().as_secs_f64(),
            input_hash,
            width,
            height,
            low_res_width,
            low_res_height,
            gpu_adapter: gpu.adapter_name(),
            glowpass_version: env!("CARGO_PKG_VERSION").to_string(),
            warnings,
        };
        let path = job.metadata_path();
        metadata
            .save(&path)
            .map_err(|e| EffectError::new(EffectPhase::ImageIo, e))?;
        outcome.metadata_path = Some(path);
    }

    log::info!("Finished {:?} in {:.2}s", job.output_path, start.elapsed().as_secs_f64());
    Ok(outcome)
}
