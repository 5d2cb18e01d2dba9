//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Job change settling
pub mod settling {
    /// Ticks to wait after a job change before trusting element state.
    /// The host needs a few frames after a job swap before gauge visibility
    /// and positions stop changing.
    pub const SETTLE_FRAMES: u8 = 5;
}

/// Element rendering constants (host node fields)
pub mod node {
    /// Fully opaque alpha channel value
    pub const ALPHA_OPAQUE: u8 = 255;

    /// Fully transparent alpha channel value
    pub const ALPHA_HIDDEN: u8 = 0;

    /// Minimum rotation difference (radians) worth writing back to the host
    pub const ROTATION_EPSILON: f32 = 0.01;

    /// Node flag: rotation/scale transform is honored when drawing
    pub const FLAG_USE_TRANSFORM: u8 = 0x1;

    /// Node flag: transform is dirty and must be recomputed
    pub const FLAG_TRANSFORM_DIRTY: u8 = 0x4;

    /// Both flags required for a non-default rotation to render
    pub const ROTATION_FLAGS: u8 = FLAG_USE_TRANSFORM | FLAG_TRANSFORM_DIRTY;
}

/// Element settings limits
pub mod validation {
    /// Lowest accepted rotation in degrees
    pub const MIN_ROTATION: i32 = -180;

    /// Highest accepted rotation in degrees
    pub const MAX_ROTATION: i32 = 180;

    /// Largest accepted offset in pixels, either direction
    pub const MAX_OFFSET: i32 = 8192;
}

/// Configuration file constants
pub mod config {
    /// Application directory name under the user's config dir
    pub const APP_DIR: &str = "jobgauge-adjust";

    /// Settings file name
    pub const FILENAME: &str = "settings.json";

    /// Current settings schema version
    pub const VERSION: u32 = 1;
}

/// Localization constants
pub mod localization {
    /// Strings file name inside each language directory
    pub const STRINGS_FILE: &str = "strings.json";
}
