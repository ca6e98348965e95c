//! `newsbadge` crate (library surface).
//!
//! The primary entrypoint is the `newsbadge` binary (one-shot scans, the stdio page
//! agent, and the standalone analyzer). This module re-exports the workspace crates
//! so embedders do not depend on internal crate layout.

pub use newsbadge_core as core;
pub use newsbadge_local as local;
