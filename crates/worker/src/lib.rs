//! Synchronous invoke-style front end.
//!
//! One invocation event in, one terminal JSON response out. The binary
//! reads events as JSON lines on stdin and answers each on stdout.

pub mod config;
pub mod handler;
