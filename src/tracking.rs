//! Element tracking table
//!
//! One record per physical element of the active job, created the first time
//! the element is seen after activation. Records live in a slab so the per
//! frame path addresses them by a stable integer slot instead of hashing a
//! composite key every time.

use slab::Slab;
use std::collections::HashMap;

use crate::config::ElementSettings;
use crate::types::{ElementKey, Position};

/// Baseline and drift bookkeeping for one element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingRecord {
    /// Position at first sight, before any adjustment
    pub baseline: Position,
    /// Rotation (radians) at first sight
    pub baseline_rotation: f32,
    /// Accumulated host-driven movement since the baseline was captured
    pub drift: Position,
    /// Last position written by us. Only our own writes and drift
    /// absorption move it.
    pub last_applied: Position,
    /// Alpha was zeroed by us and must be restored on reset
    pub hidden_by_us: bool,
}

/// Movement observed between two hook firings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shift {
    pub dx: i32,
    pub dy: i32,
}

impl Shift {
    pub fn is_zero(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

impl TrackingRecord {
    pub fn new(observed: Position, rotation: f32) -> Self {
        Self {
            baseline: observed,
            baseline_rotation: rotation,
            drift: Position::default(),
            last_applied: observed,
            hidden_by_us: false,
        }
    }

    /// Where the host would show the element without our offsets
    pub fn restore_position(&self) -> Position {
        self.baseline.offset(self.drift.x, self.drift.y)
    }

    /// Where the element should be drawn with `settings` applied
    ///
    /// Left-aligned elements ignore horizontal drift: the host produced it
    /// by right-align padding which no longer applies.
    pub fn intended_position(&self, settings: &ElementSettings, left_align: bool) -> Position {
        let mut intended = self
            .restore_position()
            .offset(settings.offset_x, settings.offset_y);
        if left_align {
            intended.x = intended.x.saturating_sub(self.drift.x);
        }
        intended
    }

    /// Compare the host's current position with our last write and absorb
    /// any difference as drift.
    ///
    /// With `left_align` the horizontal part is not absorbed and
    /// `last_applied.x` stays put; the caller snaps the live element back to
    /// it.
    pub fn observe(&mut self, current: Position, left_align: bool) -> Shift {
        let shift = Shift {
            dx: current.x.saturating_sub(self.last_applied.x),
            dy: current.y.saturating_sub(self.last_applied.y),
        };

        if shift.dx != 0 && !left_align {
            self.drift.x = self.drift.x.saturating_add(shift.dx);
            self.last_applied.x = current.x;
        }
        if shift.dy != 0 {
            self.drift.y = self.drift.y.saturating_add(shift.dy);
            self.last_applied.y = current.y;
        }
        shift
    }
}

/// Arena of tracking records keyed by element
#[derive(Debug, Default)]
pub struct TrackingTable {
    records: Slab<TrackingRecord>,
    index: HashMap<ElementKey, usize>,
}

impl TrackingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, key: ElementKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Slot for `key`, capturing a new record with `capture` on first sight
    pub fn slot_or_insert_with(&mut self, key: ElementKey, capture: impl FnOnce() -> TrackingRecord) -> usize {
        if let Some(slot) = self.index.get(&key) {
            return *slot;
        }
        let slot = self.records.insert(capture());
        self.index.insert(key, slot);
        slot
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut TrackingRecord> {
        self.records.get_mut(slot)
    }

    pub fn record(&self, key: ElementKey) -> Option<&TrackingRecord> {
        self.slot(key).and_then(|slot| self.records.get(slot))
    }

    /// Forget every record belonging to one panel of the active job
    /// Returns how many records were dropped
    pub fn remove_panel(&mut self, panel: usize) -> usize {
        let records = &mut self.records;
        let before = self.index.len();
        self.index.retain(|key, slot| {
            if key.panel == panel {
                records.try_remove(*slot);
                false
            } else {
                true
            }
        });
        before - self.index.len()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
