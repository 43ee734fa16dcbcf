//! Bloom post-processing on wgpu.
//!
//! [`effects::Bloom`] extracts the bright parts of a frame at reduced
//! resolution, blurs them and adds them back over the frame. The `gpu`
//! module holds the small resource layer the effects are built on.

pub mod cli;
pub mod effects;
pub mod error;
pub mod gpu;
pub mod job;
pub mod params;
pub mod profiling;
pub mod ui;

pub use effects::{Bloom, GaussianBlur, PassFilter, PassFilterType};
pub use error::{EffectError, EffectPhase, Result};
pub use gpu::{Fbo, GpuContext, RenderContext, Texture};
pub use job::{BloomSettings, WorkingFormat};
pub use ui::ParamUi;
