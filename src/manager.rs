//! Gauge state manager
//!
//! Owns the job activation state machine and the element tracking table.
//! Orchestration code calls [`GaugeStateManager::on_tick`] once per host frame
//! and [`GaugeStateManager::on_settings_changed`] after an edit; host adapters
//! forward hook deliveries to [`GaugeStateManager::on_hook_event`].
//!
//! None of the entry points return errors. Failures are logged at the
//! boundary and the frame is skipped, leaving state in place so the next tick
//! retries.

use std::rc::Rc;
use tracing::{debug, error, info};

use crate::catalog::{Catalog, ElementDescriptor, JobCatalogEntry};
use crate::config::{ElementSettings, JobSettings, SharedSettings};
use crate::constants::{node, settling};
use crate::error::{FaultKind, GaugeError, HostError, Result};
use crate::hooks::HookSet;
use crate::host::{ElementHandle, HookEvent, HostAdapter, PanelHandle};
use crate::tracking::{TrackingRecord, TrackingTable};
use crate::types::{ElementKey, JobId, Position};

/// Job activation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeState {
    /// No player or job observed
    Inactive,
    /// Job just changed; waiting for the host to finish building its panels
    Settling { job: JobId, frames: u8 },
    /// Steady state
    Active { job: JobId },
    /// Host tore the job's panels down without a job change
    AwaitingReady { job: JobId },
}

pub struct GaugeStateManager<'c> {
    catalog: &'c Catalog,
    settings: Option<SharedSettings>,
    state: GaugeState,
    tracking: TrackingTable,
    hooks: HookSet,
    /// Adjustments of the active job are currently applied
    applied: bool,
}

impl<'c> GaugeStateManager<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            settings: None,
            state: GaugeState::Inactive,
            tracking: TrackingTable::new(),
            hooks: HookSet::new(),
            applied: false,
        }
    }

    /// Attach the settings store, filling in defaults for every catalog entry
    pub fn initialize(&mut self, settings: SharedSettings) {
        match settings.try_borrow_mut() {
            Ok(mut store) => {
                let created = store.ensure_catalog_entries(self.catalog);
                info!(jobs = self.catalog.len(), created = created, "Gauge state manager initialized");
            }
            Err(_) => Self::report(&GaugeError::SettingsBusy, "initialize"),
        }
        self.settings = Some(settings);
    }

    pub fn state(&self) -> GaugeState {
        self.state
    }

    /// Tracking record of one element of the active job
    pub fn tracked(&self, panel_name: &str, element_id: u32) -> Option<&TrackingRecord> {
        let GaugeState::Active { job } = self.state else {
            return None;
        };
        let index = self
            .catalog
            .job(job)?
            .panels
            .iter()
            .position(|panel| panel.name == panel_name)?;
        self.tracking.record(ElementKey::new(index, element_id))
    }

    pub fn tracked_count(&self) -> usize {
        self.tracking.len()
    }

    pub fn hooks_attached(&self) -> usize {
        self.hooks.len()
    }

    /// Per-frame entry point
    pub fn on_tick<H: HostAdapter>(&mut self, host: &mut H) {
        let observed = host.active_job();
        if let Err(err) = self.tick(host, observed) {
            Self::report(&err, "tick");
        }
    }

    /// Entry point for the editor committing a change
    pub fn on_settings_changed<H: HostAdapter>(&mut self, host: &mut H) {
        if let Err(err) = self.settings_changed(host) {
            Self::report(&err, "settings changed");
        }
    }

    /// Entry point for adapters, called after the host ran a hooked update
    pub fn on_hook_event<H: HostAdapter>(&mut self, host: &mut H, event: HookEvent) {
        if let Err(err) = self.hook_event(host, event) {
            Self::report(&err, "hook");
        }
    }

    /// Restore every tracked element and release all hooks
    pub fn dispose<H: HostAdapter>(&mut self, host: &mut H) {
        info!(tracked = self.tracking.len(), hooks = self.hooks.len(), "Disposing gauge state manager");
        self.teardown(host);
        self.state = GaugeState::Inactive;
    }

    fn report(err: &GaugeError, context: &str) {
        match err.kind() {
            FaultKind::HostResolutionMiss => debug!(context = context, error = %err, "Host resolution miss"),
            FaultKind::ConfigurationGap => {
                error!(context = context, error = %err, "Missing element settings, using defaults")
            }
            FaultKind::UnexpectedRuntimeFault => {
                error!(context = context, error = %err, "Gauge update failed")
            }
        }
    }

    fn shared(&self) -> Result<SharedSettings> {
        self.settings.as_ref().map(Rc::clone).ok_or(GaugeError::NotInitialized)
    }

    fn job_enabled(&self, job: JobId) -> Result<bool> {
        let shared = self.shared()?;
        let store = shared.try_borrow().map_err(|_| GaugeError::SettingsBusy)?;
        Ok(store.is_enabled(job))
    }

    fn tick<H: HostAdapter>(&mut self, host: &mut H, observed: Option<JobId>) -> Result<()> {
        let Some(job) = observed else {
            if self.state != GaugeState::Inactive {
                info!("No active job, gauge adjustments inactive");
                self.teardown(host);
                self.state = GaugeState::Inactive;
            }
            return Ok(());
        };

        match self.state {
            GaugeState::Inactive => self.begin_settling(host, job),
            GaugeState::Settling { job: current, frames } if current == job => {
                let frames = frames.saturating_add(1);
                if frames >= settling::SETTLE_FRAMES {
                    return self.activate(host, job);
                }
                self.state = GaugeState::Settling { job, frames };
            }
            GaugeState::Active { job: active } if active == job => return self.poll_active(host, job),
            GaugeState::AwaitingReady { job: waiting } if waiting == job => {
                if self.first_panel_ready(host, job) {
                    info!(job = job, "Gauge panel is back, re-activating");
                    self.begin_settling(host, job);
                }
            }
            previous => {
                info!(job = job, previous = ?previous, "Job changed");
                self.begin_settling(host, job);
            }
        }
        Ok(())
    }

    fn begin_settling<H: HostAdapter>(&mut self, host: &mut H, job: JobId) {
        self.teardown(host);
        self.state = GaugeState::Settling { job, frames: 0 };
        debug!(job = job, frames = settling::SETTLE_FRAMES, "Waiting for job panels to settle");
    }

    fn first_panel_ready<H: HostAdapter>(&self, host: &H, job: JobId) -> bool {
        self.catalog
            .job(job)
            .and_then(JobCatalogEntry::first_panel)
            .is_none_or(|panel| host.resolve_panel(&panel.name).is_some())
    }

    fn activate<H: HostAdapter>(&mut self, host: &mut H, job: JobId) -> Result<()> {
        let catalog = self.catalog;
        let entry = match catalog.job(job) {
            Some(entry) if !entry.coming_soon && !entry.panels.is_empty() => entry,
            _ => {
                debug!(job = job, "Job has no adjustable gauge");
                self.tracking.clear();
                self.applied = false;
                self.state = GaugeState::Active { job };
                return Ok(());
            }
        };

        let enabled = self.job_enabled(job)?;
        self.tracking.clear();
        self.applied = enabled;
        self.state = GaugeState::Active { job };
        if enabled {
            self.apply_panels(host, entry, 0..entry.panels.len())?;
        }
        info!(
            job = job,
            name = %entry.name,
            enabled = enabled,
            tracked = self.tracking.len(),
            hooks = self.hooks.len(),
            "Gauge adjustments active"
        );
        Ok(())
    }

    /// Restore tracked elements if we changed them, then drop hooks and
    /// tracking
    fn teardown<H: HostAdapter>(&mut self, host: &mut H) {
        if let GaugeState::Active { job } = self.state {
            if self.applied && !self.tracking.is_empty() {
                debug!(job = job, tracked = self.tracking.len(), "Restoring tracked elements");
                self.reset_all(host, job);
            }
        }
        self.hooks.detach_all(host);
        self.tracking.clear();
        self.applied = false;
    }

    fn await_ready<H: HostAdapter>(&mut self, host: &mut H, job: JobId) {
        self.hooks.detach_all(host);
        self.tracking.clear();
        self.state = GaugeState::AwaitingReady { job };
        info!(job = job, "Gauge panels torn down, waiting for them to return");
    }

    fn settings_changed<H: HostAdapter>(&mut self, host: &mut H) -> Result<()> {
        let GaugeState::Active { job } = self.state else {
            return Ok(());
        };
        let catalog = self.catalog;
        let Some(entry) = catalog.job(job).filter(|entry| !entry.coming_soon) else {
            return Ok(());
        };

        match (self.applied, self.job_enabled(job)?) {
            (true, false) => {
                info!(job = job, "Gauge adjustments disabled, restoring");
                self.teardown(host);
            }
            (applied, true) => {
                if !applied {
                    info!(job = job, "Gauge adjustments enabled");
                }
                self.applied = true;
                self.apply_panels(host, entry, 0..entry.panels.len())?;
            }
            (false, false) => {}
        }
        Ok(())
    }

    /// Active steady state: pick up panels that appeared, were rebuilt, or
    /// vanished without a finalize notification
    fn poll_active<H: HostAdapter>(&mut self, host: &mut H, job: JobId) -> Result<()> {
        if !self.applied {
            return Ok(());
        }
        let catalog = self.catalog;
        let Some(entry) = catalog.job(job) else {
            return Ok(());
        };

        let mut resolvable = false;
        let mut lost = false;
        let mut pending = Vec::new();
        for (index, panel) in entry.panels.iter().enumerate() {
            let live = host.resolve_panel(&panel.name);
            let hooked = self.hooks.hooked_panel(index);
            match (live, hooked) {
                (Some(live), Some(hooked)) if live == hooked => resolvable = true,
                (Some(_), hooked) => {
                    resolvable = true;
                    if hooked.is_some() {
                        let dropped = self.tracking.remove_panel(index);
                        debug!(panel = %panel.name, dropped = dropped, "Panel was rebuilt, recapturing");
                    }
                    pending.push(index);
                }
                (None, Some(hooked)) => {
                    debug!(panel = %panel.name, "Watched panel vanished");
                    self.hooks.release(host, hooked);
                    self.tracking.remove_panel(index);
                    lost = true;
                }
                (None, None) => {}
            }
        }

        if lost && !resolvable {
            self.await_ready(host, job);
            return Ok(());
        }
        if !pending.is_empty() {
            self.apply_panels(host, entry, pending)?;
        }
        Ok(())
    }

    fn apply_panels<H: HostAdapter>(
        &mut self,
        host: &mut H,
        entry: &JobCatalogEntry,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<()> {
        let shared = self.shared()?;
        let mut gaps = Vec::new();
        {
            let store = shared.try_borrow().map_err(|_| GaugeError::SettingsBusy)?;
            let job_settings = store.job(entry.id);
            for index in indices {
                if let Err(err) = self.apply_panel(host, entry, index, job_settings, &mut gaps) {
                    Self::report(&err, "apply");
                }
            }
        }
        self.heal(&shared, entry.id, gaps);
        Ok(())
    }

    fn apply_panel<H: HostAdapter>(
        &mut self,
        host: &mut H,
        entry: &JobCatalogEntry,
        index: usize,
        job_settings: Option<&JobSettings>,
        gaps: &mut Vec<String>,
    ) -> Result<()> {
        let Some(descriptor_panel) = entry.panels.get(index) else {
            return Ok(());
        };
        let panel = host
            .resolve_panel(&descriptor_panel.name)
            .ok_or_else(|| GaugeError::PanelUnavailable {
                panel: descriptor_panel.name.clone(),
            })?;
        self.hooks.attach(host, index, panel, &descriptor_panel.name)?;

        for descriptor in &descriptor_panel.elements {
            let Some(component) = job_settings.and_then(|settings| settings.component(&descriptor.key)) else {
                gaps.push(descriptor.key.clone());
                continue;
            };
            for &element_id in &descriptor.element_ids {
                let Some(element) = host.resolve_element(panel, element_id) else {
                    debug!(panel = %descriptor_panel.name, element = element_id, "Element not resolvable yet");
                    continue;
                };
                let key = ElementKey::new(index, element_id);
                if let Err(err) = self.apply_element(host, key, element, descriptor, component) {
                    Self::report(&err, "apply element");
                }
            }
        }
        Ok(())
    }

    /// Report keys the catalog has but the settings store lacks, and insert
    /// defaults so the next pass finds them
    fn heal(&self, shared: &SharedSettings, job: JobId, gaps: Vec<String>) {
        if gaps.is_empty() {
            return;
        }
        for key in &gaps {
            Self::report(&GaugeError::ConfigurationGap { job, key: key.clone() }, "apply");
        }
        match shared.try_borrow_mut() {
            Ok(mut store) => {
                let job_settings = store.job_or_default(job);
                for key in &gaps {
                    job_settings.component_or_default(key);
                }
            }
            Err(_) => Self::report(&GaugeError::SettingsBusy, "heal"),
        }
    }

    /// Slot of a tracked element, capturing its baseline on first sight
    fn track<H: HostAdapter>(&mut self, host: &H, key: ElementKey, element: ElementHandle) -> Result<usize> {
        if let Some(slot) = self.tracking.slot(key) {
            return Ok(slot);
        }
        let (x, y) = host.position(element)?;
        let rotation = host.rotation(element)?;
        let record = TrackingRecord::new(Position::from_host(x, y), rotation);
        debug!(
            panel = key.panel,
            element = key.element_id,
            x = record.baseline.x,
            y = record.baseline.y,
            "Captured baseline"
        );
        Ok(self.tracking.slot_or_insert_with(key, || record))
    }

    fn apply_element<H: HostAdapter>(
        &mut self,
        host: &mut H,
        key: ElementKey,
        element: ElementHandle,
        descriptor: &ElementDescriptor,
        component: &ElementSettings,
    ) -> Result<()> {
        let slot = self.track(host, key, element)?;
        let Some(record) = self.tracking.get_mut(slot) else {
            return Ok(());
        };

        let left_align = component.left_align && descriptor.can_left_align;
        let intended = record.intended_position(component, left_align);
        let (x, y) = intended.to_host();
        host.set_position(element, x, y)?;
        record.last_applied = intended;

        let alpha = host.opacity(element)?;
        if component.hide {
            if alpha != node::ALPHA_HIDDEN {
                host.set_opacity(element, node::ALPHA_HIDDEN)?;
            }
            record.hidden_by_us = true;
        } else {
            if alpha == node::ALPHA_HIDDEN {
                host.set_opacity(element, node::ALPHA_OPAQUE)?;
            }
            record.hidden_by_us = false;
        }

        if descriptor.can_rotate {
            // A zero setting means "as the host drew it"
            let target = if component.rotation == 0 {
                record.baseline_rotation
            } else {
                component.rotation_radians()
            };
            if (host.rotation(element)? - target).abs() > node::ROTATION_EPSILON {
                host.set_rotation(element, target)?;
            }
            if component.rotation != 0 {
                let flags = host.node_flags(element)?;
                if flags & node::ROTATION_FLAGS != node::ROTATION_FLAGS {
                    host.set_node_flags(element, flags | node::ROTATION_FLAGS)?;
                }
            }
        }
        Ok(())
    }

    fn reset_all<H: HostAdapter>(&mut self, host: &mut H, job: JobId) {
        let Some(entry) = self.catalog.job(job) else {
            return;
        };
        for (index, descriptor_panel) in entry.panels.iter().enumerate() {
            let Some(panel) = self.hooks.hooked_panel(index) else {
                continue;
            };
            for descriptor in &descriptor_panel.elements {
                for &element_id in &descriptor.element_ids {
                    let Some(record) = self.tracking.record(ElementKey::new(index, element_id)) else {
                        continue;
                    };
                    let Some(element) = host.resolve_element(panel, element_id) else {
                        continue;
                    };
                    if let Err(err) = Self::reset_element(host, element, record, descriptor.can_rotate) {
                        Self::report(&GaugeError::from(err), "reset");
                    }
                }
            }
        }
    }

    /// Put an element back where the host would draw it without us
    fn reset_element<H: HostAdapter>(
        host: &mut H,
        element: ElementHandle,
        record: &TrackingRecord,
        can_rotate: bool,
    ) -> std::result::Result<(), HostError> {
        let (x, y) = record.restore_position().to_host();
        host.set_position(element, x, y)?;
        if record.hidden_by_us && host.opacity(element)? != node::ALPHA_OPAQUE {
            host.set_opacity(element, node::ALPHA_OPAQUE)?;
        }
        if can_rotate && (host.rotation(element)? - record.baseline_rotation).abs() > node::ROTATION_EPSILON {
            host.set_rotation(element, record.baseline_rotation)?;
        }
        Ok(())
    }

    fn hook_event<H: HostAdapter>(&mut self, host: &mut H, event: HookEvent) -> Result<()> {
        let GaugeState::Active { job } = self.state else {
            return Ok(());
        };
        if !self.applied {
            return Ok(());
        }
        // Shared update entry point: most deliveries are for panels we do not watch
        let Some(index) = self.hooks.watched(event.panel()) else {
            return Ok(());
        };
        let catalog = self.catalog;
        let Some(entry) = catalog.job(job) else {
            return Ok(());
        };

        match event {
            HookEvent::Finalizing(panel) => {
                self.hooks.release(host, panel);
                let dropped = self.tracking.remove_panel(index);
                debug!(panel = index, dropped = dropped, "Watched panel finalizing");
                if self.hooks.is_empty() {
                    self.await_ready(host, job);
                }
                Ok(())
            }
            HookEvent::Updated(panel) => self.reconcile_panel(host, entry, index, panel),
        }
    }

    /// Runs right after the host laid the panel out for this frame
    fn reconcile_panel<H: HostAdapter>(
        &mut self,
        host: &mut H,
        entry: &JobCatalogEntry,
        index: usize,
        panel: PanelHandle,
    ) -> Result<()> {
        let Some(descriptor_panel) = entry.panels.get(index) else {
            return Ok(());
        };
        let shared = self.shared()?;
        let store = shared.try_borrow().map_err(|_| GaugeError::SettingsBusy)?;
        let Some(job_settings) = store.job(entry.id) else {
            return Ok(());
        };

        for descriptor in &descriptor_panel.elements {
            let Some(component) = job_settings.component(&descriptor.key) else {
                continue;
            };
            let left_align = component.left_align && descriptor.can_left_align;
            for &element_id in &descriptor.element_ids {
                let Some(element) = host.resolve_element(panel, element_id) else {
                    continue;
                };
                let key = ElementKey::new(index, element_id);
                let outcome = match self.tracking.slot(key) {
                    Some(slot) => self.track_drift(host, slot, element, component, left_align),
                    None => {
                        debug!(panel = %descriptor_panel.name, element = element_id, "Late element, applying");
                        self.apply_element(host, key, element, descriptor, component)
                    }
                };
                if let Err(err) = outcome {
                    Self::report(&err, "reconcile element");
                }
            }
        }
        Ok(())
    }

    fn track_drift<H: HostAdapter>(
        &mut self,
        host: &mut H,
        slot: usize,
        element: ElementHandle,
        component: &ElementSettings,
        left_align: bool,
    ) -> Result<()> {
        let (x, y) = host.position(element)?;
        let Some(record) = self.tracking.get_mut(slot) else {
            return Ok(());
        };

        let shift = record.observe(Position::from_host(x, y), left_align);
        if !shift.is_zero() {
            debug!(
                dx = shift.dx,
                dy = shift.dy,
                drift_x = record.drift.x,
                drift_y = record.drift.y,
                "Host moved element"
            );
        }
        if left_align && shift.dx != 0 {
            host.set_position(element, record.last_applied.x as f32, y)?;
        }
        if component.hide && host.opacity(element)? != node::ALPHA_HIDDEN {
            host.set_opacity(element, node::ALPHA_HIDDEN)?;
            record.hidden_by_us = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsStore;
    use crate::sim::{SimElement, SimulatedHost, WriteKind};

    const PALADIN: JobId = 19;
    const PANEL: &str = "JobHudPLD0";
    const OATH: u32 = 18;
    const OATH_TEXT: u32 = 17;
    const IRON_WILL: u32 = 15;

    fn paladin_host() -> SimulatedHost {
        let mut host = SimulatedHost::new();
        host.set_job(Some(PALADIN));
        host.spawn_panel(
            PANEL,
            [
                (OATH, SimElement::at(100.0, 200.0)),
                (OATH_TEXT, SimElement::at(50.0, 10.0)),
                (IRON_WILL, SimElement::at(30.0, 30.0)),
            ],
        );
        host
    }

    fn start(catalog: &Catalog) -> (GaugeStateManager<'_>, SharedSettings, SimulatedHost) {
        let mut store = SettingsStore::default();
        store.job_or_default(PALADIN).enabled = true;
        let settings = store.into_shared();
        let mut manager = GaugeStateManager::new(catalog);
        manager.initialize(Rc::clone(&settings));
        (manager, settings, paladin_host())
    }

    fn edit(settings: &SharedSettings, key: &str, change: impl FnOnce(&mut ElementSettings)) {
        let mut store = settings.borrow_mut();
        change(store.job_or_default(PALADIN).component_or_default(key));
    }

    fn set_enabled(settings: &SharedSettings, enabled: bool) {
        settings.borrow_mut().job_or_default(PALADIN).enabled = enabled;
    }

    fn settle(manager: &mut GaugeStateManager<'_>, host: &mut SimulatedHost) {
        for _ in 0..=settling::SETTLE_FRAMES {
            manager.on_tick(host);
        }
    }

    fn frame(manager: &mut GaugeStateManager<'_>, host: &mut SimulatedHost) {
        host.run_frame(|host, event| manager.on_hook_event(host, event));
    }

    fn position(host: &SimulatedHost, id: u32) -> (f32, f32) {
        let element = host.element(PANEL, id).unwrap();
        (element.x, element.y)
    }

    #[test]
    fn test_settling_delays_activation() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);

        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::Settling { job: PALADIN, frames: 0 });
        for _ in 1..settling::SETTLE_FRAMES {
            manager.on_tick(&mut host);
            frame(&mut manager, &mut host);
        }
        assert_eq!(
            manager.state(),
            GaugeState::Settling {
                job: PALADIN,
                frames: settling::SETTLE_FRAMES - 1
            }
        );
        assert!(host.writes().is_empty());
        assert_eq!(manager.hooks_attached(), 0);

        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        assert_eq!(host.position_writes(PANEL, OATH), vec![(110.0, 200.0)]);
        assert_eq!(manager.hooks_attached(), 1);
        assert_eq!(manager.tracked_count(), 3);
        manager.dispose(&mut host);
    }

    #[test]
    fn test_logout_mid_settle_never_applies() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);

        manager.on_tick(&mut host);
        manager.on_tick(&mut host);
        host.set_job(None);
        manager.on_tick(&mut host);

        assert_eq!(manager.state(), GaugeState::Inactive);
        assert!(host.writes().is_empty());
        assert_eq!(host.active_hooks(), 0);

        // Coming back starts the count over
        host.set_job(Some(PALADIN));
        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::Settling { job: PALADIN, frames: 0 });
    }

    #[test]
    fn test_job_switch_mid_settle_restarts_count() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, _settings, mut host) = start(&catalog);

        manager.on_tick(&mut host);
        manager.on_tick(&mut host);
        manager.on_tick(&mut host);
        host.set_job(Some(21));
        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::Settling { job: 21, frames: 0 });
    }

    #[test]
    fn test_default_settings_leave_elements_alone() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, _settings, mut host) = start(&catalog);
        let before: Vec<_> = [OATH, OATH_TEXT, IRON_WILL]
            .iter()
            .map(|id| host.element(PANEL, *id).unwrap())
            .collect();

        settle(&mut manager, &mut host);
        frame(&mut manager, &mut host);

        let after: Vec<_> = [OATH, OATH_TEXT, IRON_WILL]
            .iter()
            .map(|id| host.element(PANEL, *id).unwrap())
            .collect();
        assert_eq!(before, after);
        assert!(
            host.writes()
                .iter()
                .all(|write| matches!(write.kind, WriteKind::Position { .. }))
        );
        manager.dispose(&mut host);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| {
            oath.offset_x = 7;
            oath.offset_y = -3;
            oath.rotation = 45;
        });
        edit(&settings, "IronWill", |iron| iron.hide = true);

        settle(&mut manager, &mut host);
        let once: Vec<_> = [OATH, IRON_WILL].iter().map(|id| host.element(PANEL, *id)).collect();

        manager.on_settings_changed(&mut host);
        manager.on_settings_changed(&mut host);
        let twice: Vec<_> = [OATH, IRON_WILL].iter().map(|id| host.element(PANEL, *id)).collect();
        assert_eq!(once, twice);
        assert_eq!(manager.tracked(PANEL, OATH).unwrap().baseline, Position::new(100, 200));
        manager.dispose(&mut host);
    }

    #[test]
    fn test_host_shift_becomes_drift() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);

        settle(&mut manager, &mut host);
        assert_eq!(host.position_writes(PANEL, OATH), vec![(110.0, 200.0)]);

        // Host layout moves the piece 10 to the left, e.g. a sibling went away
        host.queue_layout_shift(PANEL, OATH, -10.0, 0.0);
        frame(&mut manager, &mut host);

        let record = manager.tracked(PANEL, OATH).unwrap();
        assert_eq!(record.drift, Position::new(-10, 0));
        assert_eq!(record.last_applied, Position::new(100, 200));

        manager.on_settings_changed(&mut host);
        assert_eq!(host.position_writes(PANEL, OATH).last(), Some(&(100.0, 200.0)));
        manager.dispose(&mut host);
    }

    #[test]
    fn test_drift_accumulates_both_axes() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "IronWill", |iron| {
            iron.offset_x = 5;
            iron.offset_y = 5;
        });
        settle(&mut manager, &mut host);

        host.queue_layout_shift(PANEL, IRON_WILL, 3.0, -4.0);
        frame(&mut manager, &mut host);
        host.queue_layout_shift(PANEL, IRON_WILL, 2.0, 0.0);
        frame(&mut manager, &mut host);
        // Quiet frame records nothing
        frame(&mut manager, &mut host);

        assert_eq!(manager.tracked(PANEL, IRON_WILL).unwrap().drift, Position::new(5, -4));
        manager.on_settings_changed(&mut host);
        // baseline (30,30) + drift (5,-4) + offset (5,5)
        assert_eq!(position(&host, IRON_WILL), (40.0, 31.0));
        manager.dispose(&mut host);
    }

    #[test]
    fn test_left_align_snaps_back() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "OathText", |text| text.left_align = true);
        settle(&mut manager, &mut host);
        assert_eq!(position(&host, OATH_TEXT), (50.0, 10.0));

        for dx in [10.0, -4.0, 7.0] {
            host.queue_layout_shift(PANEL, OATH_TEXT, dx, 0.0);
            frame(&mut manager, &mut host);
            assert_eq!(position(&host, OATH_TEXT), (50.0, 10.0));
        }
        let record = manager.tracked(PANEL, OATH_TEXT).unwrap();
        assert_eq!(record.drift.x, 0);
        assert_eq!(record.last_applied.x, 50);

        edit(&settings, "OathText", |text| text.offset_x = 5);
        manager.on_settings_changed(&mut host);
        assert_eq!(position(&host, OATH_TEXT), (55.0, 10.0));
        manager.dispose(&mut host);
    }

    #[test]
    fn test_left_align_needs_capability() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        // Oath cannot be left-aligned, so its drift is tracked as usual
        edit(&settings, "Oath", |oath| oath.left_align = true);
        settle(&mut manager, &mut host);

        host.queue_layout_shift(PANEL, OATH, 6.0, 0.0);
        frame(&mut manager, &mut host);
        assert_eq!(position(&host, OATH), (106.0, 200.0));
        assert_eq!(manager.tracked(PANEL, OATH).unwrap().drift.x, 6);
        manager.dispose(&mut host);
    }

    #[test]
    fn test_disable_resets_once_and_detaches() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);
        edit(&settings, "IronWill", |iron| iron.hide = true);
        settle(&mut manager, &mut host);
        host.queue_layout_shift(PANEL, OATH, -10.0, 0.0);
        frame(&mut manager, &mut host);
        assert_eq!(host.element(PANEL, IRON_WILL).unwrap().alpha, node::ALPHA_HIDDEN);
        host.clear_writes();

        set_enabled(&settings, false);
        manager.on_settings_changed(&mut host);

        // Baseline plus drift, user offset removed
        assert_eq!(host.position_writes(PANEL, OATH), vec![(90.0, 200.0)]);
        assert_eq!(host.position_writes(PANEL, OATH_TEXT), vec![(50.0, 10.0)]);
        assert_eq!(host.position_writes(PANEL, IRON_WILL), vec![(30.0, 30.0)]);
        assert_eq!(host.element(PANEL, IRON_WILL).unwrap().alpha, node::ALPHA_OPAQUE);
        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        assert_eq!(manager.hooks_attached(), 0);
        assert_eq!(host.active_hooks(), 0);

        host.clear_writes();
        host.queue_layout_shift(PANEL, OATH, 4.0, 0.0);
        frame(&mut manager, &mut host);
        manager.on_tick(&mut host);
        manager.on_settings_changed(&mut host);
        assert!(host.writes().is_empty());

        // Re-enabling captures fresh baselines
        set_enabled(&settings, true);
        manager.on_settings_changed(&mut host);
        assert_eq!(manager.tracked(PANEL, OATH).unwrap().baseline, Position::new(94, 200));
        assert_eq!(position(&host, OATH), (104.0, 200.0));
        assert_eq!(manager.hooks_attached(), 1);
        manager.dispose(&mut host);
    }

    #[test]
    fn test_hide_is_reasserted_every_update() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "IronWill", |iron| iron.hide = true);
        settle(&mut manager, &mut host);
        assert_eq!(host.element(PANEL, IRON_WILL).unwrap().alpha, node::ALPHA_HIDDEN);

        host.set_alpha_directly(PANEL, IRON_WILL, node::ALPHA_OPAQUE);
        frame(&mut manager, &mut host);
        assert_eq!(host.element(PANEL, IRON_WILL).unwrap().alpha, node::ALPHA_HIDDEN);

        edit(&settings, "IronWill", |iron| iron.hide = false);
        manager.on_settings_changed(&mut host);
        assert_eq!(host.element(PANEL, IRON_WILL).unwrap().alpha, node::ALPHA_OPAQUE);
        manager.dispose(&mut host);
    }

    #[test]
    fn test_rotation_sets_flags_and_respects_capability() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.rotation = 90);
        edit(&settings, "OathText", |text| text.rotation = 45);
        settle(&mut manager, &mut host);

        let oath = host.element(PANEL, OATH).unwrap();
        assert!((oath.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        assert_eq!(oath.flags, node::ROTATION_FLAGS);
        assert_eq!(host.element(PANEL, OATH_TEXT).unwrap().rotation, 0.0);

        set_enabled(&settings, false);
        manager.on_settings_changed(&mut host);
        assert_eq!(host.element(PANEL, OATH).unwrap().rotation, 0.0);
    }

    #[test]
    fn test_foreign_panel_updates_are_ignored() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);
        host.spawn_panel("JobHudWAR0", [(14, SimElement::at(5.0, 5.0))]);
        settle(&mut manager, &mut host);
        host.clear_writes();

        host.queue_layout_shift("JobHudWAR0", 14, 3.0, 0.0);
        frame(&mut manager, &mut host);
        manager.on_hook_event(&mut host, HookEvent::Updated(PanelHandle::from_raw(9999)));
        manager.on_hook_event(&mut host, HookEvent::Finalizing(PanelHandle::from_raw(9999)));

        assert!(host.writes().is_empty());
        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        assert_eq!(manager.hooks_attached(), 1);
        manager.dispose(&mut host);
    }

    #[test]
    fn test_finalize_waits_for_panel_then_resettles() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);
        settle(&mut manager, &mut host);

        assert!(host.destroy_panel(PANEL, |host, event| manager.on_hook_event(host, event)));
        assert_eq!(manager.state(), GaugeState::AwaitingReady { job: PALADIN });
        assert_eq!(host.active_hooks(), 0);
        assert_eq!(manager.tracked_count(), 0);

        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::AwaitingReady { job: PALADIN });

        host.spawn_panel(PANEL, [(OATH, SimElement::at(120.0, 200.0))]);
        host.clear_writes();
        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::Settling { job: PALADIN, frames: 0 });
        assert!(host.writes().is_empty());

        for _ in 0..settling::SETTLE_FRAMES {
            manager.on_tick(&mut host);
        }
        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        assert_eq!(manager.tracked(PANEL, OATH).unwrap().baseline, Position::new(120, 200));
        assert_eq!(position(&host, OATH), (130.0, 200.0));
        manager.dispose(&mut host);
    }

    #[test]
    fn test_vanished_panel_detected_on_tick() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, _settings, mut host) = start(&catalog);
        settle(&mut manager, &mut host);

        // Adapter that cannot report finalization
        host.destroy_panel(PANEL, |_, _| {});
        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::AwaitingReady { job: PALADIN });
        assert_eq!(host.active_hooks(), 0);
    }

    #[test]
    fn test_rebuilt_panel_is_recaptured() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);
        settle(&mut manager, &mut host);

        host.destroy_panel(PANEL, |_, _| {});
        host.spawn_panel(PANEL, [(OATH, SimElement::at(120.0, 200.0))]);
        manager.on_tick(&mut host);

        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        assert_eq!(manager.tracked(PANEL, OATH).unwrap().baseline, Position::new(120, 200));
        assert_eq!(position(&host, OATH), (130.0, 200.0));
        assert_eq!(manager.hooks_attached(), 1);
        assert_eq!(host.active_hooks(), 1);
        manager.dispose(&mut host);
    }

    #[test]
    fn test_partial_finalize_keeps_other_panels() {
        let catalog = Catalog::builtin().unwrap();
        let settings = SettingsStore::default().into_shared();
        let mut manager = GaugeStateManager::new(&catalog);
        manager.initialize(Rc::clone(&settings));
        {
            let mut store = settings.borrow_mut();
            let monk = store.job_or_default(20);
            monk.enabled = true;
            monk.component_or_default("Master").offset_y = 4;
            monk.component_or_default("Chakra1").offset_y = 2;
        }

        let mut host = SimulatedHost::new();
        host.set_job(Some(20));
        host.spawn_panel("JobHudMNK1", [(18, SimElement::at(0.0, 0.0))]);
        host.spawn_panel("JobHudMNK0", [(39, SimElement::at(10.0, 10.0))]);
        settle(&mut manager, &mut host);
        assert_eq!(manager.hooks_attached(), 2);
        assert_eq!(host.element("JobHudMNK0", 39).unwrap().y, 14.0);

        host.destroy_panel("JobHudMNK1", |host, event| manager.on_hook_event(host, event));
        assert_eq!(manager.state(), GaugeState::Active { job: 20 });
        assert_eq!(manager.hooks_attached(), 1);
        assert!(manager.tracked("JobHudMNK1", 18).is_none());
        assert!(manager.tracked("JobHudMNK0", 39).is_some());

        // Comes back and is picked up lazily
        host.spawn_panel("JobHudMNK1", [(18, SimElement::at(0.0, 0.0))]);
        manager.on_tick(&mut host);
        assert_eq!(manager.hooks_attached(), 2);
        assert_eq!(host.element("JobHudMNK1", 18).unwrap().y, 2.0);

        host.destroy_panel("JobHudMNK1", |host, event| manager.on_hook_event(host, event));
        host.destroy_panel("JobHudMNK0", |host, event| manager.on_hook_event(host, event));
        assert_eq!(manager.state(), GaugeState::AwaitingReady { job: 20 });
    }

    #[test]
    fn test_job_change_restores_previous_job() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);
        settle(&mut manager, &mut host);
        assert_eq!(position(&host, OATH), (110.0, 200.0));

        host.set_job(Some(21));
        manager.on_tick(&mut host);
        assert_eq!(position(&host, OATH), (100.0, 200.0));
        assert_eq!(manager.state(), GaugeState::Settling { job: 21, frames: 0 });
        assert_eq!(host.active_hooks(), 0);
    }

    #[test]
    fn test_logout_while_active_restores() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_y = -20);
        settle(&mut manager, &mut host);

        host.set_job(None);
        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::Inactive);
        assert_eq!(position(&host, OATH), (100.0, 200.0));
        assert_eq!(host.active_hooks(), 0);
    }

    #[test]
    fn test_missing_settings_entry_is_healed() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        settings
            .borrow_mut()
            .job_or_default(PALADIN)
            .components
            .remove("IronWill");

        settle(&mut manager, &mut host);
        assert!(host.position_writes(PANEL, IRON_WILL).is_empty());
        assert!(manager.tracked(PANEL, IRON_WILL).is_none());
        assert!(manager.tracked(PANEL, OATH).is_some());
        assert!(settings.borrow().job(PALADIN).unwrap().component("IronWill").is_some());

        manager.on_settings_changed(&mut host);
        assert!(manager.tracked(PANEL, IRON_WILL).is_some());
        manager.dispose(&mut host);
    }

    #[test]
    fn test_tick_before_initialize_retries() {
        let catalog = Catalog::builtin().unwrap();
        let mut manager = GaugeStateManager::new(&catalog);
        let mut host = paladin_host();

        settle(&mut manager, &mut host);
        assert!(matches!(manager.state(), GaugeState::Settling { job: PALADIN, .. }));
        assert!(host.writes().is_empty());

        let mut store = SettingsStore::default();
        store.job_or_default(PALADIN).enabled = true;
        manager.initialize(store.into_shared());
        manager.on_tick(&mut host);
        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        manager.dispose(&mut host);
    }

    #[test]
    fn test_coming_soon_job_tracks_nothing() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, _settings, mut host) = start(&catalog);
        host.set_job(Some(38));
        settle(&mut manager, &mut host);

        assert_eq!(manager.state(), GaugeState::Active { job: 38 });
        assert_eq!(manager.tracked_count(), 0);
        assert_eq!(manager.hooks_attached(), 0);
        manager.on_settings_changed(&mut host);
        assert!(host.writes().is_empty());
    }

    #[test]
    fn test_descriptor_with_several_elements() {
        let catalog = Catalog::builtin().unwrap();
        let settings = SettingsStore::default().into_shared();
        let mut manager = GaugeStateManager::new(&catalog);
        manager.initialize(Rc::clone(&settings));
        {
            let mut store = settings.borrow_mut();
            let bard = store.job_or_default(23);
            bard.enabled = true;
            bard.component_or_default("Repertoire1").offset_y = -5;
        }

        let mut host = SimulatedHost::new();
        host.set_job(Some(23));
        host.spawn_panel(
            "JobHudBRD0",
            [(90, SimElement::at(10.0, 50.0)), (94, SimElement::at(12.0, 50.0))],
        );
        settle(&mut manager, &mut host);

        assert_eq!(host.element("JobHudBRD0", 90).unwrap().y, 45.0);
        assert_eq!(host.element("JobHudBRD0", 94).unwrap().y, 45.0);
        manager.dispose(&mut host);
    }

    #[test]
    fn test_late_element_is_picked_up_by_hook() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, _) = start(&catalog);
        edit(&settings, "IronWill", |iron| iron.offset_x = 4);
        let mut host = SimulatedHost::new();
        host.set_job(Some(PALADIN));
        host.spawn_panel(PANEL, [(OATH, SimElement::at(100.0, 200.0))]);
        settle(&mut manager, &mut host);
        assert!(manager.tracked(PANEL, IRON_WILL).is_none());

        host.add_element(PANEL, IRON_WILL, SimElement::at(30.0, 30.0));
        frame(&mut manager, &mut host);
        assert_eq!(position(&host, IRON_WILL), (34.0, 30.0));
        assert_eq!(manager.tracked(PANEL, IRON_WILL).unwrap().baseline, Position::new(30, 30));
        manager.dispose(&mut host);
    }

    #[test]
    fn test_busy_settings_skip_the_frame() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        settle(&mut manager, &mut host);
        host.clear_writes();

        let guard = settings.borrow_mut();
        manager.on_settings_changed(&mut host);
        frame(&mut manager, &mut host);
        drop(guard);

        assert!(host.writes().is_empty());
        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        manager.dispose(&mut host);
    }

    #[test]
    fn test_stale_element_does_not_abort_other_resets() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.offset_x = 10);
        edit(&settings, "IronWill", |iron| iron.offset_x = 10);
        settle(&mut manager, &mut host);

        host.poison_element(PANEL, OATH);
        manager.dispose(&mut host);
        assert_eq!(position(&host, IRON_WILL), (30.0, 30.0));
        assert_eq!(manager.state(), GaugeState::Inactive);
        assert_eq!(host.active_hooks(), 0);
    }

    #[test]
    fn test_failing_element_does_not_starve_siblings() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "IronWill", |iron| iron.offset_x = 10);
        host.poison_element(PANEL, OATH);

        settle(&mut manager, &mut host);
        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        assert_eq!(position(&host, IRON_WILL), (40.0, 30.0));

        for _ in 0..10 {
            manager.on_tick(&mut host);
            frame(&mut manager, &mut host);
        }
        manager.on_settings_changed(&mut host);
        assert_eq!(position(&host, IRON_WILL), (40.0, 30.0));
        assert!(manager.tracked(PANEL, IRON_WILL).is_some());
        assert!(manager.tracked(PANEL, OATH).is_none());
        manager.dispose(&mut host);
    }

    #[test]
    fn test_extreme_offset_saturates() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, mut host) = start(&catalog);
        edit(&settings, "Oath", |oath| {
            oath.offset_x = i32::MAX;
            oath.offset_y = i32::MIN;
        });

        settle(&mut manager, &mut host);
        frame(&mut manager, &mut host);
        manager.on_tick(&mut host);

        assert_eq!(manager.state(), GaugeState::Active { job: PALADIN });
        assert_eq!(position(&host, OATH), (i32::MAX as f32, i32::MIN as f32));

        manager.dispose(&mut host);
        assert_eq!(position(&host, OATH), (100.0, 200.0));
    }

    #[test]
    fn test_rotation_flags_added_when_angle_already_matches() {
        let catalog = Catalog::builtin().unwrap();
        let (mut manager, settings, _) = start(&catalog);
        edit(&settings, "Oath", |oath| oath.rotation = 90);
        let mut host = SimulatedHost::new();
        host.set_job(Some(PALADIN));
        let mut tilted = SimElement::at(100.0, 200.0);
        tilted.rotation = std::f32::consts::FRAC_PI_2;
        host.spawn_panel(PANEL, [(OATH, tilted)]);

        settle(&mut manager, &mut host);

        assert_eq!(host.element(PANEL, OATH).unwrap().flags, node::ROTATION_FLAGS);
        assert!(
            !host
                .writes()
                .iter()
                .any(|write| matches!(write.kind, WriteKind::Rotation(_)))
        );
        manager.dispose(&mut host);
    }
}
