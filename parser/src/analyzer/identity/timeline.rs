use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{FieldId, SlotId, Tick};

/// Who occupied a slot, as of some tick.
///
/// `account_field` and `user_field` are the identifiers whose changes carry
/// this slot's account and user ids. They are fixed for the whole capture,
/// only the values move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotIdentity {
    pub slot: SlotId,
    pub account_id: Option<i64>,
    pub user_id: Option<i64>,
    pub account_field: Option<FieldId>,
    pub user_field: Option<FieldId>,
}

impl SlotIdentity {
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            account_id: None,
            user_id: None,
            account_field: None,
            user_field: None,
        }
    }
}

/// A slot identity valid from `tick` until the next entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimedIdentity {
    pub tick: Tick,
    pub identity: SlotIdentity,
}

/// Identity history of one slot, sorted by tick with at most one entry per tick.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SlotHistory {
    entries: Vec<TimedIdentity>,
}

impl SlotHistory {
    /// Inserts or overwrites the entry at `tick`. Appending is the common case.
    pub fn insert(&mut self, tick: Tick, identity: SlotIdentity) {
        let idx = match self.entries.last() {
            Some(last) if last.tick < tick => self.entries.len(),
            None => 0,
            Some(_) => self.entries.partition_point(|e| e.tick < tick),
        };

        match self.entries.get_mut(idx) {
            Some(existing) if existing.tick == tick => existing.identity = identity,
            _ => self.entries.insert(idx, TimedIdentity { tick, identity }),
        }
    }

    /// The entry with the greatest tick at or before `tick`.
    pub fn at(&self, tick: Tick) -> Option<&SlotIdentity> {
        let idx = self.entries.partition_point(|e| e.tick <= tick);
        idx.checked_sub(1).map(|idx| &self.entries[idx].identity)
    }

    pub fn entries(&self) -> &[TimedIdentity] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&TimedIdentity> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-slot identity histories for a whole capture.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SlotIdentityTimeline {
    /// Slot wiring known from the schema, with no values yet
    defaults: BTreeMap<SlotId, SlotIdentity>,
    histories: BTreeMap<SlotId, SlotHistory>,
}

impl SlotIdentityTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slot's wiring. Later calls for the same slot replace it.
    pub fn register_slot(&mut self, identity: SlotIdentity) {
        self.defaults.insert(identity.slot, identity);
    }

    pub fn insert(&mut self, tick: Tick, identity: SlotIdentity) {
        self.histories
            .entry(identity.slot)
            .or_default()
            .insert(tick, identity);
    }

    /// Identity of `slot` as of `tick`.
    ///
    /// `None` when the slot is unknown or nobody had been seen in it yet.
    pub fn resolve(&self, slot: SlotId, tick: Tick) -> Option<SlotIdentity> {
        self.histories.get(&slot)?.at(tick).copied()
    }

    pub fn default_for(&self, slot: SlotId) -> Option<&SlotIdentity> {
        self.defaults.get(&slot)
    }

    pub fn history(&self, slot: SlotId) -> Option<&SlotHistory> {
        self.histories.get(&slot)
    }

    /// Every slot known from the schema or seen in an update.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        let mut slots: Vec<SlotId> = self
            .defaults
            .keys()
            .chain(self.histories.keys())
            .copied()
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots.into_iter()
    }

    /// Total number of history entries across slots.
    pub fn entry_count(&self) -> usize {
        self.histories.values().map(SlotHistory::len).sum()
    }
}
