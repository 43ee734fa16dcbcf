pub mod bloom;
pub mod gaussian_blur;
pub mod pass_filter;

pub use bloom::{low_res_size, Bloom};
pub use gaussian_blur::{kernel_weights, GaussianBlur, MAX_KERNEL_WIDTH};
pub use pass_filter::{PassFilter, PassFilterType};
