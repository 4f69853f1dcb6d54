// THEORY:
// This file is the main entry point for the `simd_blend` library crate.
// The public surface is deliberately small: `pipeline` exposes `BlendPipeline`
// with its config and result types, and `bench` runs repeated timed trials on
// top of it. The kernels themselves live in `core_modules` and can also be
// used directly through the `BlendKernel` trait.

pub mod bench;
pub mod core_modules;
pub mod pipeline;
