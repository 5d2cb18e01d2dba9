//! Error types for the gauge core

use thiserror::Error;

use crate::types::JobId;

/// Failures reported by a host adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("element handle {0} is no longer valid")]
    StaleElement(u64),
    #[error("panel handle {0} is no longer valid")]
    StalePanel(u64),
}

/// How a failure should be treated at the tick/hook boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Panel or element not currently resolvable; expected during transitions
    HostResolutionMiss,
    /// Catalog references a key the settings store does not have
    ConfigurationGap,
    /// Anything else; logged and the frame is skipped
    UnexpectedRuntimeFault,
}

#[derive(Error, Debug)]
pub enum GaugeError {
    #[error("panel '{panel}' is not available")]
    PanelUnavailable { panel: String },
    #[error("no settings for element '{key}' of job {job}")]
    ConfigurationGap { job: JobId, key: String },
    #[error("settings store is already borrowed")]
    SettingsBusy,
    #[error("manager used before initialize")]
    NotInitialized,
    #[error(transparent)]
    Host(#[from] HostError),
}

impl GaugeError {
    pub fn kind(&self) -> FaultKind {
        match self {
            GaugeError::PanelUnavailable { .. } => FaultKind::HostResolutionMiss,
            GaugeError::ConfigurationGap { .. } => FaultKind::ConfigurationGap,
            GaugeError::SettingsBusy | GaugeError::NotInitialized | GaugeError::Host(_) => {
                FaultKind::UnexpectedRuntimeFault
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GaugeError>;
