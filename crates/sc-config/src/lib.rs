//! Configuration surface and observability bootstrap for SpiralCert
//! pipelines.
//!
//! [`PipelineConfig`] is what operators author (JSON on disk) and what the
//! provenance chain commits to — through a canonical little-endian binary
//! encoding, never the JSON text, so the hash is independent of formatting
//! and serializer versions. Environment overrides are read once into a
//! process-wide snapshot; nothing below the configuration layer reads
//! ambient state.

pub mod config;
pub mod env;
pub mod tracing;

pub use config::{ConfigError, PipelineConfig};
pub use env::{overrides, EnvOverrides};
