//! Active panel hooks
//!
//! At most one hook per watched panel. The set also keeps the reverse lookup
//! from a live panel instance to the watched panel it belongs to, which is
//! how hook deliveries for foreign panel instances get filtered out.
//! Hooks are acquired with [`HookSet::attach`] and released with
//! [`HookSet::detach_all`]; a set dropped while still holding hooks logs an
//! error because the host would keep calling into a manager that is gone.

use std::collections::HashMap;
use tracing::{debug, error};

use crate::error::HostError;
use crate::host::{HookToken, HostAdapter, PanelHandle};

#[derive(Debug, Clone, Copy)]
struct ActiveHook {
    panel: PanelHandle,
    token: HookToken,
}

#[derive(Debug, Default)]
pub struct HookSet {
    /// Watched panel index → its hook
    hooks: HashMap<usize, ActiveHook>,
    /// Live panel instance → watched panel index
    instances: HashMap<PanelHandle, usize>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook `panel` unless it already is. A watched panel that came back as a
    /// new instance has its old hook released first.
    pub fn attach<H: HostAdapter>(
        &mut self,
        host: &mut H,
        index: usize,
        panel: PanelHandle,
        name: &str,
    ) -> Result<(), HostError> {
        if let Some(existing) = self.hooks.get(&index) {
            if existing.panel == panel {
                return Ok(());
            }
            debug!(panel = %name, "Panel instance changed, replacing hook");
            let stale = *existing;
            host.disable_hook(stale.token);
            self.instances.remove(&stale.panel);
            self.hooks.remove(&index);
        }

        let token = host.hook_panel_update(panel)?;
        debug!(panel = %name, token = token.raw(), "Attached update hook");
        self.hooks.insert(index, ActiveHook { panel, token });
        self.instances.insert(panel, index);
        Ok(())
    }

    /// Instance currently hooked for a watched panel
    pub fn hooked_panel(&self, index: usize) -> Option<PanelHandle> {
        self.hooks.get(&index).map(|hook| hook.panel)
    }

    /// Watched panel index for a live instance, `None` for foreign panels
    pub fn watched(&self, panel: PanelHandle) -> Option<usize> {
        self.instances.get(&panel).copied()
    }

    /// Release the hook of an instance that is being torn down
    /// Returns the watched panel index it belonged to
    pub fn release<H: HostAdapter>(&mut self, host: &mut H, panel: PanelHandle) -> Option<usize> {
        let index = self.instances.remove(&panel)?;
        if let Some(hook) = self.hooks.remove(&index) {
            host.disable_hook(hook.token);
        }
        Some(index)
    }

    pub fn detach_all<H: HostAdapter>(&mut self, host: &mut H) {
        if self.hooks.is_empty() {
            return;
        }
        debug!(count = self.hooks.len(), "Removing update hooks");
        for (_, hook) in self.hooks.drain() {
            host.disable_hook(hook.token);
        }
        self.instances.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }
}

impl Drop for HookSet {
    fn drop(&mut self) {
        if !self.hooks.is_empty() {
            error!(count = self.hooks.len(), "Hook set dropped with hooks still attached");
        }
    }
}
