//! Observability helpers
//!
//! The client itself only emits `tracing` events. Applications that do not
//! install their own subscriber can use [`init_logging`].

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
