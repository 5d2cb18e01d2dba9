//! Scripted sessions against the simulated host
//!
//! A scenario plays the part of the orchestration glue: it owns the settings
//! store, the host and the manager, and replays a list of steps (job changes,
//! frames, host layout shifts, settings edits, panel teardown).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::{ElementSettings, SettingsStore};
use crate::manager::{GaugeState, GaugeStateManager};
use crate::sim::{SimElement, SimulatedHost};
use crate::types::JobId;

/// Element as spawned by a scenario
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ElementSpec {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub rotation: f32,
}

impl ElementSpec {
    fn to_sim(self) -> (u32, SimElement) {
        let mut element = SimElement::at(self.x, self.y);
        element.rotation = self.rotation;
        (self.id, element)
    }
}

fn default_notify() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Step {
    /// Player is now on this job
    Login(JobId),

    /// Player logged out
    Logout,

    /// Host builds (or rebuilds) a panel
    SpawnPanel { panel: String, elements: Vec<ElementSpec> },

    /// Host tears a panel down. With `notify` off the adapter does not report
    /// finalization and the manager has to notice on its own.
    DestroyPanel {
        panel: String,
        #[serde(default = "default_notify")]
        notify: bool,
    },

    /// A child shows up late
    AddElement { panel: String, element: ElementSpec },

    /// Host layout moves an element on the panel's next update
    Shift { panel: String, element: u32, dx: f32, dy: f32 },

    /// Ticks without a host update in between
    Tick(u32),

    /// Full frames: tick, then the host updates its panels
    Frame(u32),

    Enable(JobId),

    Disable(JobId),

    /// Replace one element's settings, as the editor would
    Configure { job: JobId, key: String, settings: ElementSettings },

    /// Shut the manager down
    Dispose,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Scenario {
    /// Settings at the start of the session
    #[serde(default)]
    pub settings: SettingsStore,
    pub steps: Vec<Step>,
}

/// Final state of one element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementReport {
    pub panel: String,
    pub id: u32,
    pub element: SimElement,
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub state: GaugeState,
    pub frames: u64,
    pub writes: usize,
    pub elements: Vec<ElementReport>,
}

impl ScenarioReport {
    pub fn element(&self, panel: &str, id: u32) -> Option<&SimElement> {
        self.elements
            .iter()
            .find(|report| report.panel == panel && report.id == id)
            .map(|report| &report.element)
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state: {:?}", self.state)?;
        writeln!(f, "frames: {}, writes: {}", self.frames, self.writes)?;
        for report in &self.elements {
            let element = &report.element;
            writeln!(
                f,
                "  {}[{}]: x={} y={} rotation={:.3} alpha={} flags={:#x}",
                report.panel, report.id, element.x, element.y, element.rotation, element.alpha, element.flags
            )?;
        }
        Ok(())
    }
}

impl Scenario {
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read scenario: {:?}", path))?;
        Self::from_json(&contents).with_context(|| format!("Invalid scenario file: {:?}", path))
    }

    /// Replay every step and report where things ended up
    pub fn run(&self, catalog: &Catalog) -> Result<ScenarioReport> {
        let settings = self.settings.clone().into_shared();
        let mut manager = GaugeStateManager::new(catalog);
        manager.initialize(Rc::clone(&settings));
        let mut host = SimulatedHost::new();

        for (index, step) in self.steps.iter().enumerate() {
            debug!(step = index, action = ?step, "Scenario step");
            match step {
                Step::Login(job) => host.set_job(Some(*job)),
                Step::Logout => host.set_job(None),
                Step::SpawnPanel { panel, elements } => {
                    host.spawn_panel(panel, elements.iter().map(|spec| spec.to_sim()));
                }
                Step::DestroyPanel { panel, notify } => {
                    let existed = if *notify {
                        host.destroy_panel(panel, |host, event| manager.on_hook_event(host, event))
                    } else {
                        host.destroy_panel(panel, |_, _| {})
                    };
                    if !existed {
                        bail!("Step {}: no panel named '{}'", index, panel);
                    }
                }
                Step::AddElement { panel, element } => {
                    let (id, state) = element.to_sim();
                    if host.add_element(panel, id, state).is_none() {
                        bail!("Step {}: no panel named '{}'", index, panel);
                    }
                }
                Step::Shift { panel, element, dx, dy } => {
                    if !host.queue_layout_shift(panel, *element, *dx, *dy) {
                        bail!("Step {}: no element {} in panel '{}'", index, element, panel);
                    }
                }
                Step::Tick(count) => {
                    for _ in 0..*count {
                        manager.on_tick(&mut host);
                    }
                }
                Step::Frame(count) => {
                    for _ in 0..*count {
                        manager.on_tick(&mut host);
                        host.run_frame(|host, event| manager.on_hook_event(host, event));
                    }
                }
                Step::Enable(job) | Step::Disable(job) => {
                    let enabled = matches!(step, Step::Enable(_));
                    settings.borrow_mut().job_or_default(*job).enabled = enabled;
                    manager.on_settings_changed(&mut host);
                }
                Step::Configure { job, key, settings: component } => {
                    *settings
                        .borrow_mut()
                        .job_or_default(*job)
                        .component_or_default(key) = *component;
                    manager.on_settings_changed(&mut host);
                }
                Step::Dispose => manager.dispose(&mut host),
            }
        }

        let sim = &host;
        let elements = sim
            .panel_names()
            .flat_map(|panel| {
                sim.element_ids(panel).into_iter().filter_map(move |id| {
                    sim.element(panel, id).map(|element| ElementReport {
                        panel: panel.to_string(),
                        id,
                        element,
                    })
                })
            })
            .collect();
        let report = ScenarioReport {
            state: manager.state(),
            frames: host.frame(),
            writes: host.writes().len(),
            elements,
        };
        info!(steps = self.steps.len(), state = ?report.state, writes = report.writes, "Scenario finished");

        manager.dispose(&mut host);
        Ok(report)
    }
}
