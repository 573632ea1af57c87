//! Image-generation job pipeline.
//!
//! Drives one job through its lifecycle against a ComfyUI backend:
//! validate the request, wait for the backend to be ready, stage the
//! source images as input assets, render the style's workflow template,
//! then submit, poll and retrieve the produced images.
//!
//! [`runner::GenerationPipeline`] is the single implementation both
//! front ends (the invoke handler and the streaming HTTP service) call.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod pool;
pub mod runner;
pub mod stager;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;
