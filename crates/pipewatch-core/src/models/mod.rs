//! Data models for Pipewatch

mod alert;
mod telemetry;

pub use alert::*;
pub use telemetry::*;
