#![forbid(unsafe_code)]
//! Keeps user adjustments to job gauge HUD elements applied on top of a host
//! that re-lays those elements out every frame.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod host;
pub mod localization;
pub mod manager;
pub mod scenario;
pub mod sim;
pub mod tracking;
pub mod types;

pub use catalog::Catalog;
pub use error::{GaugeError, HostError};
pub use host::{HookEvent, HostAdapter};
pub use manager::{GaugeState, GaugeStateManager};
