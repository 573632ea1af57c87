//! Domain types shared by every relay crate.
//!
//! Holds the caller-facing job request model and its validation, the
//! style selector, the clock abstraction used by polling loops, and the
//! process-wide service state (readiness flag and request counter),
//! plus typed environment lookups shared by the binaries.

pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod state;
