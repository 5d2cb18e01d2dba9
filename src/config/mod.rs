//! Configuration management for jobgauge-adjust
//!
//! - **settings**: the in-memory settings store the gauge manager reads
//! - **persistent**: JSON load/save of that store

pub mod persistent;
pub mod settings;

// Re-export commonly used types
pub use settings::{ElementSettings, JobSettings, SettingsStore, SharedSettings};
