//! In-memory host used by the tests and the `simulate` command
//!
//! Models just enough of a retained-mode HUD: named panels holding numbered
//! element nodes, a per-frame update that applies the host's own layout
//! shifts, panel teardown, and an update entry point shared by every panel
//! instance (so one hook sees updates for all of them).

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::constants::node;
use crate::error::HostError;
use crate::host::{ElementHandle, HookEvent, HookToken, HostAdapter, PanelHandle};
use crate::types::JobId;

/// Drawable state of one element node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimElement {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub alpha: u8,
    pub flags: u8,
}

impl SimElement {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            rotation: 0.0,
            alpha: node::ALPHA_OPAQUE,
            flags: 0,
        }
    }
}

/// What a write through the adapter changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteKind {
    Position { x: f32, y: f32 },
    Rotation(f32),
    Flags(u8),
    Opacity(u8),
}

/// One write performed through the adapter
#[derive(Debug, Clone, PartialEq)]
pub struct SimWrite {
    pub panel: String,
    pub element_id: u32,
    pub kind: WriteKind,
}

#[derive(Debug)]
struct SimNode {
    panel: String,
    element_id: u32,
    state: SimElement,
    stale: bool,
}

#[derive(Debug)]
struct SimPanel {
    handle: PanelHandle,
    elements: BTreeMap<u32, ElementHandle>,
    /// Layout shifts the host applies during this panel's next update
    pending: Vec<(u32, f32, f32)>,
}

#[derive(Debug, Default)]
pub struct SimulatedHost {
    job: Option<JobId>,
    next_id: u64,
    panels: BTreeMap<String, SimPanel>,
    nodes: HashMap<ElementHandle, SimNode>,
    hooks: HashMap<HookToken, PanelHandle>,
    writes: Vec<SimWrite>,
    frame: u64,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_raw(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn set_job(&mut self, job: Option<JobId>) {
        self.job = job;
    }

    /// Create (or rebuild) a panel with the given elements
    pub fn spawn_panel(&mut self, name: &str, elements: impl IntoIterator<Item = (u32, SimElement)>) -> PanelHandle {
        if let Some(old) = self.panels.remove(name) {
            self.drop_nodes(&old);
        }

        let handle = PanelHandle::from_raw(self.next_raw());
        let mut panel = SimPanel {
            handle,
            elements: BTreeMap::new(),
            pending: Vec::new(),
        };
        for (element_id, state) in elements {
            let element = ElementHandle::from_raw(self.next_raw());
            panel.elements.insert(element_id, element);
            self.nodes.insert(
                element,
                SimNode {
                    panel: name.to_string(),
                    element_id,
                    state,
                    stale: false,
                },
            );
        }
        debug!(panel = %name, handle = handle.raw(), "Simulated panel created");
        self.panels.insert(name.to_string(), panel);
        handle
    }

    fn drop_nodes(&mut self, panel: &SimPanel) {
        for element in panel.elements.values() {
            self.nodes.remove(element);
        }
    }

    /// Tear a panel down. Hooked hosts deliver `Finalizing` first.
    /// Returns false when no such panel exists.
    pub fn destroy_panel(&mut self, name: &str, mut on_event: impl FnMut(&mut Self, HookEvent)) -> bool {
        let Some(handle) = self.panels.get(name).map(|panel| panel.handle) else {
            return false;
        };
        if !self.hooks.is_empty() {
            on_event(self, HookEvent::Finalizing(handle));
        }
        if let Some(panel) = self.panels.remove(name) {
            self.drop_nodes(&panel);
        }
        debug!(panel = %name, "Simulated panel destroyed");
        true
    }

    /// Add a late child to an existing panel
    pub fn add_element(&mut self, panel: &str, element_id: u32, state: SimElement) -> Option<ElementHandle> {
        let element = ElementHandle::from_raw(self.next_raw());
        let sim_panel = self.panels.get_mut(panel)?;
        sim_panel.elements.insert(element_id, element);
        self.nodes.insert(
            element,
            SimNode {
                panel: panel.to_string(),
                element_id,
                state,
                stale: false,
            },
        );
        Some(element)
    }

    /// Queue a relative move the host's own layout will make on the panel's
    /// next update, e.g. a sibling appearing
    pub fn queue_layout_shift(&mut self, panel: &str, element_id: u32, dx: f32, dy: f32) -> bool {
        match self.panels.get_mut(panel) {
            Some(sim_panel) if sim_panel.elements.contains_key(&element_id) => {
                sim_panel.pending.push((element_id, dx, dy));
                true
            }
            _ => false,
        }
    }

    /// Host-side opacity change, as the host would do on its own
    pub fn set_alpha_directly(&mut self, panel: &str, element_id: u32, alpha: u8) {
        if let Some(node) = self.node_mut(panel, element_id) {
            node.state.alpha = alpha;
        }
    }

    /// Make every access through this element's handle fail
    pub fn poison_element(&mut self, panel: &str, element_id: u32) {
        if let Some(node) = self.node_mut(panel, element_id) {
            node.stale = true;
        }
    }

    /// Run one host frame: every panel performs its own update and, while any
    /// hook is installed on the shared entry point, `on_event` runs right
    /// after the original update.
    pub fn run_frame(&mut self, mut on_event: impl FnMut(&mut Self, HookEvent)) {
        self.frame += 1;
        let names: Vec<String> = self.panels.keys().cloned().collect();
        for name in names {
            let Some(handle) = self.original_update(&name) else {
                continue;
            };
            if !self.hooks.is_empty() {
                on_event(self, HookEvent::Updated(handle));
            }
        }
    }

    fn original_update(&mut self, name: &str) -> Option<PanelHandle> {
        let panel = self.panels.get_mut(name)?;
        let pending = std::mem::take(&mut panel.pending);
        let handle = panel.handle;
        let moves: Vec<(ElementHandle, f32, f32)> = pending
            .into_iter()
            .filter_map(|(id, dx, dy)| panel.elements.get(&id).map(|element| (*element, dx, dy)))
            .collect();
        for (element, dx, dy) in moves {
            if let Some(node) = self.nodes.get_mut(&element) {
                node.state.x += dx;
                node.state.y += dy;
            }
        }
        Some(handle)
    }

    fn node_mut(&mut self, panel: &str, element_id: u32) -> Option<&mut SimNode> {
        let element = *self.panels.get(panel)?.elements.get(&element_id)?;
        self.nodes.get_mut(&element)
    }

    fn node(&self, element: ElementHandle) -> Result<&SimNode, HostError> {
        match self.nodes.get(&element) {
            Some(node) if !node.stale => Ok(node),
            _ => Err(HostError::StaleElement(element.raw())),
        }
    }

    fn write(&mut self, element: ElementHandle, kind: WriteKind) -> Result<(), HostError> {
        let node = match self.nodes.get_mut(&element) {
            Some(node) if !node.stale => node,
            _ => return Err(HostError::StaleElement(element.raw())),
        };
        match kind {
            WriteKind::Position { x, y } => {
                node.state.x = x;
                node.state.y = y;
            }
            WriteKind::Rotation(radians) => node.state.rotation = radians,
            WriteKind::Flags(flags) => node.state.flags = flags,
            WriteKind::Opacity(alpha) => node.state.alpha = alpha,
        }
        self.writes.push(SimWrite {
            panel: node.panel.clone(),
            element_id: node.element_id,
            kind,
        });
        Ok(())
    }

    /// Current state of an element, `None` if it does not exist
    pub fn element(&self, panel: &str, element_id: u32) -> Option<SimElement> {
        let element = self.panels.get(panel)?.elements.get(&element_id)?;
        self.nodes.get(element).map(|node| node.state)
    }

    pub fn writes(&self) -> &[SimWrite] {
        &self.writes
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Position writes made to one element
    pub fn position_writes(&self, panel: &str, element_id: u32) -> Vec<(f32, f32)> {
        self.writes
            .iter()
            .filter(|write| write.panel == panel && write.element_id == element_id)
            .filter_map(|write| match write.kind {
                WriteKind::Position { x, y } => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    pub fn active_hooks(&self) -> usize {
        self.hooks.len()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn panel_names(&self) -> impl Iterator<Item = &str> {
        self.panels.keys().map(String::as_str)
    }

    /// Element ids of a panel in ascending order
    pub fn element_ids(&self, panel: &str) -> Vec<u32> {
        self.panels
            .get(panel)
            .map(|sim_panel| sim_panel.elements.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl HostAdapter for SimulatedHost {
    fn active_job(&self) -> Option<JobId> {
        self.job
    }

    fn resolve_panel(&self, name: &str) -> Option<PanelHandle> {
        self.panels.get(name).map(|panel| panel.handle)
    }

    fn resolve_element(&self, panel: PanelHandle, element_id: u32) -> Option<ElementHandle> {
        self.panels
            .values()
            .find(|sim_panel| sim_panel.handle == panel)
            .and_then(|sim_panel| sim_panel.elements.get(&element_id))
            .copied()
    }

    fn position(&self, element: ElementHandle) -> Result<(f32, f32), HostError> {
        self.node(element).map(|node| (node.state.x, node.state.y))
    }

    fn set_position(&mut self, element: ElementHandle, x: f32, y: f32) -> Result<(), HostError> {
        self.write(element, WriteKind::Position { x, y })
    }

    fn rotation(&self, element: ElementHandle) -> Result<f32, HostError> {
        self.node(element).map(|node| node.state.rotation)
    }

    fn set_rotation(&mut self, element: ElementHandle, radians: f32) -> Result<(), HostError> {
        self.write(element, WriteKind::Rotation(radians))
    }

    fn node_flags(&self, element: ElementHandle) -> Result<u8, HostError> {
        self.node(element).map(|node| node.state.flags)
    }

    fn set_node_flags(&mut self, element: ElementHandle, flags: u8) -> Result<(), HostError> {
        self.write(element, WriteKind::Flags(flags))
    }

    fn opacity(&self, element: ElementHandle) -> Result<u8, HostError> {
        self.node(element).map(|node| node.state.alpha)
    }

    fn set_opacity(&mut self, element: ElementHandle, alpha: u8) -> Result<(), HostError> {
        self.write(element, WriteKind::Opacity(alpha))
    }

    fn hook_panel_update(&mut self, panel: PanelHandle) -> Result<HookToken, HostError> {
        if !self.panels.values().any(|sim_panel| sim_panel.handle == panel) {
            return Err(HostError::StalePanel(panel.raw()));
        }
        let token = HookToken::from_raw(self.next_raw());
        self.hooks.insert(token, panel);
        Ok(token)
    }

    fn disable_hook(&mut self, token: HookToken) {
        self.hooks.remove(&token);
    }
}
