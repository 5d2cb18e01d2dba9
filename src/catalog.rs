//! Gauge catalog: which panels each job draws and which of their elements can
//! be adjusted.
//!
//! The catalog is immutable for the life of the process. It is built once
//! (normally from the embedded `data/catalog.json`) and handed to the
//! manager by reference.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::types::JobId;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// One adjustable gauge piece. Several host element ids may make up a single
/// piece; they all share one settings entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub key: String,
    pub display_name: String,
    #[serde(default = "default_can_rotate")]
    pub can_rotate: bool,
    #[serde(default)]
    pub can_left_align: bool,
    pub element_ids: Vec<u32>,
}

fn default_can_rotate() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelDescriptor {
    /// Host lookup name of the panel
    pub name: String,
    #[serde(default)]
    pub elements: Vec<ElementDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCatalogEntry {
    pub id: JobId,
    /// Display name of the job
    pub name: String,
    #[serde(default)]
    pub coming_soon: bool,
    /// Panels in processing order
    #[serde(default)]
    pub panels: Vec<PanelDescriptor>,
}

impl JobCatalogEntry {
    /// The panel whose presence signals the job's HUD is up
    pub fn first_panel(&self) -> Option<&PanelDescriptor> {
        self.panels.first()
    }

    /// All element descriptors across panels, in catalog order
    pub fn descriptors(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.panels.iter().flat_map(|panel| panel.elements.iter())
    }

    pub fn descriptor(&self, key: &str) -> Option<&ElementDescriptor> {
        self.descriptors().find(|descriptor| descriptor.key == key)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    jobs: Vec<JobCatalogEntry>,
}

fn validate_entry(entry: &JobCatalogEntry) -> Result<()> {
    let mut keys = HashSet::new();
    for panel in &entry.panels {
        let mut ids = HashSet::new();
        for descriptor in &panel.elements {
            if !keys.insert(descriptor.key.as_str()) {
                anyhow::bail!("Job {} has duplicate element key '{}'", entry.id, descriptor.key);
            }
            for id in &descriptor.element_ids {
                if !ids.insert(*id) {
                    anyhow::bail!(
                        "Panel '{}' of job {} maps element {} more than once",
                        panel.name,
                        entry.id,
                        id
                    );
                }
            }
        }
    }
    Ok(())
}

/// Read-only job → panel → element lookup
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    jobs: BTreeMap<JobId, JobCatalogEntry>,
}

impl Catalog {
    /// Catalog shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("Failed to parse built-in catalog")
    }

    /// Load a catalog from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog from {:?}", path))?;
        let catalog = Self::from_json(&contents)
            .with_context(|| format!("Failed to parse catalog from {:?}", path))?;
        info!(path = %path.display(), jobs = catalog.jobs.len(), "Loaded catalog");
        Ok(catalog)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(contents)?;
        Self::from_entries(file.jobs)
    }

    /// Build from entries, rejecting ambiguous data
    ///
    /// Keys must be unique within a job (settings are keyed per job) and an
    /// element id may belong to only one descriptor per panel.
    pub fn from_entries(entries: Vec<JobCatalogEntry>) -> Result<Self> {
        let mut jobs = BTreeMap::new();
        for entry in entries {
            validate_entry(&entry)?;
            let id = entry.id;
            if jobs.insert(id, entry).is_some() {
                anyhow::bail!("Job {} is listed more than once", id);
            }
        }
        Ok(Self { jobs })
    }

    pub fn job(&self, id: JobId) -> Option<&JobCatalogEntry> {
        self.jobs.get(&id)
    }

    /// Jobs ordered by id
    pub fn jobs(&self) -> impl Iterator<Item = &JobCatalogEntry> {
        self.jobs.values()
    }

    /// Jobs ordered by display name, the order an editor lists them in
    pub fn jobs_by_name(&self) -> Vec<&JobCatalogEntry> {
        let mut jobs: Vec<_> = self.jobs.values().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
