//! Heavy worker — lifecycle orchestration for a background task worker.

pub mod config;
pub mod db;
pub mod error;
pub mod instrumentation;
pub mod lifecycle;
pub mod probes;
pub mod process_mode;
pub mod signals;
