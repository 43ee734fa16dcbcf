pub mod context;
pub mod fbo;
pub mod fullscreen_pass;
pub mod readback;
pub mod render_context;
pub mod states;
pub mod texture;

pub use context::GpuContext;
pub use fbo::{Fbo, MAX_COLOR_TARGETS};
pub use fullscreen_pass::{FullScreenPass, PassBindings, PassOptions, TargetLoad};
pub use render_context::RenderContext;
pub use texture::{Texture, SHADER_RESOURCE_RENDER_TARGET};
