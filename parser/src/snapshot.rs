use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::capture::PropValue;
use crate::steam_id::SteamId;
use crate::types::Tick;

/// Splits `m_vecOrigin[2]` into `m_vecOrigin`.
///
/// Some vectors are sent as an XY composite followed by their Z component as
/// element 2 of a float array.
fn third_axis_base(field: &str) -> Option<&str> {
    field.strip_suffix("[2]").filter(|base| !base.is_empty())
}

/// Property values one player held at one tick: table -> field -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerSnapshot(BTreeMap<String, BTreeMap<String, PropValue>>);

impl PlayerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a field value, folding a `name[2]` scalar into an existing
    /// `name` vector of the same table as its `z` axis.
    pub fn apply(&mut self, table: &str, field: &str, value: PropValue) {
        let fields = self.0.entry(table.to_string()).or_default();

        if let Some(base) = third_axis_base(field) {
            let existing = fields.get_mut(base).and_then(PropValue::vector_mut);
            if let (Some(vector), Some(z)) = (existing, value.as_f64()) {
                vector.z = Some(z);
                return;
            }
        }

        fields.insert(field.to_string(), value);
    }

    pub fn get(&self, table: &str, field: &str) -> Option<&PropValue> {
        self.0.get(table)?.get(field)
    }

    pub fn table(&self, table: &str) -> Option<&BTreeMap<String, PropValue>> {
        self.0.get(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, PropValue>)> {
        self.0.iter().map(|(name, fields)| (name.as_str(), fields))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Players present at one tick.
pub type TickSnapshots = BTreeMap<SteamId, PlayerSnapshot>;

/// tick -> player identity -> snapshot, for a whole capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult(BTreeMap<Tick, TickSnapshots>);

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure `tick` has a bucket, even an empty one.
    pub fn ensure_tick(&mut self, tick: Tick) -> &mut TickSnapshots {
        self.0.entry(tick).or_default()
    }

    pub fn contains_tick(&self, tick: Tick) -> bool {
        self.0.contains_key(&tick)
    }

    pub fn snapshot_mut(&mut self, tick: Tick, player: SteamId) -> &mut PlayerSnapshot {
        self.ensure_tick(tick).entry(player).or_default()
    }

    pub fn tick(&self, tick: Tick) -> Option<&TickSnapshots> {
        self.0.get(&tick)
    }

    pub fn snapshot(&self, tick: Tick, player: SteamId) -> Option<&PlayerSnapshot> {
        self.0.get(&tick)?.get(&player)
    }

    pub fn ticks(&self) -> impl Iterator<Item = (Tick, &TickSnapshots)> {
        self.0.iter().map(|(tick, players)| (*tick, players))
    }

    /// Every identity that appears at any tick.
    pub fn players(&self) -> BTreeSet<SteamId> {
        self.0.values().flat_map(|players| players.keys().copied()).collect()
    }

    /// The ticks at which `player` had a value for `table.field`, in order.
    /// Useful for pulling a position track out of the result.
    pub fn track<'a>(
        &'a self,
        player: SteamId,
        table: &'a str,
        field: &'a str,
    ) -> impl Iterator<Item = (Tick, &'a PropValue)> + 'a {
        self.0.iter().filter_map(move |(tick, players)| {
            players
                .get(&player)
                .and_then(|snapshot| snapshot.get(table, field))
                .map(|value| (*tick, value))
        })
    }

    pub fn snapshot_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
