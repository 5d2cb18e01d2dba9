//! User adjustments per job and per gauge piece
//!
//! The store is edited by the settings front end and only read by the gauge
//! manager, apart from self-healing inserts of missing defaults.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::constants::{config, validation};
use crate::types::{degrees_to_radians, JobId};

/// Settings store shared between the editor and the manager on the main thread
pub type SharedSettings = Rc<RefCell<SettingsStore>>;

/// Adjustment for one gauge piece. All zero/false means "leave it alone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSettings {
    pub hide: bool,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Degrees, -180..=180
    pub rotation: i32,
    pub left_align: bool,
}

impl ElementSettings {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn rotation_radians(&self) -> f32 {
        degrees_to_radians(self.rotation)
    }

    /// Clear offsets and visibility, leaving rotation and alignment as they are
    pub fn reset_placement(&mut self) {
        self.offset_x = 0;
        self.offset_y = 0;
        self.hide = false;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub enabled: bool,
    pub components: BTreeMap<String, ElementSettings>,
}

impl JobSettings {
    pub fn component(&self, key: &str) -> Option<&ElementSettings> {
        self.components.get(key)
    }

    /// Get a component's settings, creating defaults when missing
    pub fn component_or_default(&mut self, key: &str) -> &mut ElementSettings {
        self.components.entry(key.to_string()).or_default()
    }
}

/// Versioned record of every job's settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsStore {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub jobs: BTreeMap<JobId, JobSettings>,
}

fn default_version() -> u32 {
    config::VERSION
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self {
            version: config::VERSION,
            jobs: BTreeMap::new(),
        }
    }
}

impl SettingsStore {
    pub fn into_shared(self) -> SharedSettings {
        Rc::new(RefCell::new(self))
    }

    pub fn job(&self, id: JobId) -> Option<&JobSettings> {
        self.jobs.get(&id)
    }

    /// Get a job's settings, creating defaults when missing
    pub fn job_or_default(&mut self, id: JobId) -> &mut JobSettings {
        self.jobs.entry(id).or_default()
    }

    pub fn is_enabled(&self, id: JobId) -> bool {
        self.jobs.get(&id).is_some_and(|job| job.enabled)
    }

    /// Make sure every catalog job and gauge piece has a settings entry
    /// Returns how many entries were created
    pub fn ensure_catalog_entries(&mut self, catalog: &Catalog) -> usize {
        let mut created = 0;
        for entry in catalog.jobs() {
            let job = self.jobs.entry(entry.id).or_insert_with(|| {
                created += 1;
                JobSettings::default()
            });
            for descriptor in entry.descriptors() {
                if !job.components.contains_key(&descriptor.key) {
                    job.components.insert(descriptor.key.clone(), ElementSettings::default());
                    created += 1;
                }
            }
        }
        if created > 0 {
            debug!(created = created, "Created missing settings entries from catalog");
        }
        created
    }

    /// Clamp values to safe ranges and upgrade the version marker
    /// Called after loading from disk
    pub fn validate_and_clamp(&mut self) {
        if self.version != config::VERSION {
            warn!(found = self.version, current = config::VERSION, "Unknown settings version, upgrading");
            self.version = config::VERSION;
        }

        for (job, settings) in &mut self.jobs {
            for (key, component) in &mut settings.components {
                let clamped = component
                    .rotation
                    .clamp(validation::MIN_ROTATION, validation::MAX_ROTATION);
                if clamped != component.rotation {
                    warn!(job = job, key = %key, rotation = component.rotation, "rotation out of range, clamping");
                    component.rotation = clamped;
                }
                for (axis, offset) in [("x", &mut component.offset_x), ("y", &mut component.offset_y)] {
                    let clamped = (*offset).clamp(-validation::MAX_OFFSET, validation::MAX_OFFSET);
                    if clamped != *offset {
                        warn!(job = job, key = %key, axis = axis, offset = *offset, "offset out of range, clamping");
                        *offset = clamped;
                    }
                }
            }
        }
    }
}
