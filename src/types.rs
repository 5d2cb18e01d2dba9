//! Small value types shared across modules

use serde::{Deserialize, Serialize};

/// Host class/job identifier
pub type JobId = u32;

/// Whole-pixel element position
///
/// The host stores floats; all tracking arithmetic is done on truncated
/// integers so a sub-pixel wobble is never mistaken for drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Truncate a host-reported float position
    pub fn from_host(x: f32, y: f32) -> Self {
        Self {
            x: x as i32,
            y: y as i32,
        }
    }

    /// Convert back to host floats for writing
    pub fn to_host(self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

/// Identifies one physical element within the active job's panels
///
/// `panel` is the index of the panel inside the job's catalog entry, so the
/// key only means something for the activation it was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub panel: usize,
    pub element_id: u32,
}

impl ElementKey {
    pub fn new(panel: usize, element_id: u32) -> Self {
        Self { panel, element_id }
    }
}

/// Convert whole degrees to radians
pub fn degrees_to_radians(degrees: i32) -> f32 {
    (std::f64::consts::PI / 180.0 * degrees as f64) as f32
}
