//! ComfyUI REST client library.
//!
//! Provides the HTTP API wrapper, the [`backend::ComfyBackend`] seam the
//! relay pipeline is written against, typed history records, the
//! readiness prober, and a handle on a locally launched ComfyUI process.

pub mod api;
pub mod backend;
pub mod history;
pub mod probe;
pub mod process;
#[cfg(feature = "stub-server")]
pub mod stub;
