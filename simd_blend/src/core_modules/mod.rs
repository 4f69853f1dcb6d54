pub mod error;
pub mod gray_image;
pub mod kernel;
pub mod partitioned_kernel;
pub mod pixel_blend;
pub mod scalar_kernel;
pub mod vector_kernel;
