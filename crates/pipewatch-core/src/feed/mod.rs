//! Telemetry feed ingestion
//!
//! Fetches the analytics feed's positional `data_array` and normalizes it into
//! keyed records using the fixed column schema.

mod client;
mod normalizer;

pub use client::FeedClient;
pub use normalizer::Normalizer;
