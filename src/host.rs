//! Contract between the gauge core and the host application
//!
//! The host owns every panel and element. The core only ever sees opaque
//! handles obtained through [`HostAdapter`], re-resolves them on each
//! activation and hook firing, and never assumes they outlive the call that
//! produced them.
//!
//! # Hook delivery
//!
//! [`HostAdapter::hook_panel_update`] asks the adapter to intercept a
//! panel's per-frame update. Whenever an intercepted update runs, the adapter
//! must:
//!
//! 1. run the host's original update first,
//! 2. deliver [`HookEvent::Updated`] to `GaugeStateManager::on_hook_event`,
//! 3. return the original result unchanged.
//!
//! When an intercepted panel is torn down the adapter delivers
//! [`HookEvent::Finalizing`] before running the original teardown.
//! Hosts often share one update entry point between many panel instances,
//! so deliveries may name panels the manager is not watching; the manager
//! ignores those. Adapters that cannot intercept at all may instead deliver
//! `Updated` for every watched panel once per tick, at the cost of one frame
//! of latency.

use crate::error::HostError;
use crate::types::JobId;

/// One live panel instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelHandle(u64);

impl PanelHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One element node inside a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Registration of one intercepted panel update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookToken(u64);

impl HookToken {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Callback payload delivered by an adapter from inside the host's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// The panel just finished its own layout pass for this frame
    Updated(PanelHandle),
    /// The panel instance is about to be destroyed
    Finalizing(PanelHandle),
}

impl HookEvent {
    pub fn panel(self) -> PanelHandle {
        match self {
            HookEvent::Updated(panel) | HookEvent::Finalizing(panel) => panel,
        }
    }
}

/// Everything the gauge core needs from the host
///
/// Resolution misses are normal (panels come and go, children initialize
/// late) and are reported as `None`. Reads and writes through a handle return
/// `HostError` when the handle went stale underneath us.
pub trait HostAdapter {
    /// Job of the logged-in player, `None` while logged out or loading
    fn active_job(&self) -> Option<JobId>;

    /// Look up a live panel by name. Cheap enough to call every frame.
    fn resolve_panel(&self, name: &str) -> Option<PanelHandle>;

    fn resolve_element(&self, panel: PanelHandle, element_id: u32) -> Option<ElementHandle>;

    fn position(&self, element: ElementHandle) -> Result<(f32, f32), HostError>;

    fn set_position(&mut self, element: ElementHandle, x: f32, y: f32) -> Result<(), HostError>;

    /// Rotation in radians
    fn rotation(&self, element: ElementHandle) -> Result<f32, HostError>;

    fn set_rotation(&mut self, element: ElementHandle, radians: f32) -> Result<(), HostError>;

    /// Raw draw flags of the element node
    fn node_flags(&self, element: ElementHandle) -> Result<u8, HostError>;

    fn set_node_flags(&mut self, element: ElementHandle, flags: u8) -> Result<(), HostError>;

    /// Alpha channel, 0..=255
    fn opacity(&self, element: ElementHandle) -> Result<u8, HostError>;

    fn set_opacity(&mut self, element: ElementHandle, alpha: u8) -> Result<(), HostError>;

    /// Start intercepting the panel's per-frame update (see module docs)
    fn hook_panel_update(&mut self, panel: PanelHandle) -> Result<HookToken, HostError>;

    /// Stop intercepting. Unknown or already disabled tokens are ignored.
    fn disable_hook(&mut self, token: HookToken);
}
