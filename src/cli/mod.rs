//! Command line entry points
//!
//! The binary in `main.rs` only parses arguments; the work happens here.

pub mod run;

pub use run::{RunArgs, run_proxy_mode};
