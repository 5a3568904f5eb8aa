use std::collections::HashMap;
use tracing::{Level, info, span, trace};

use crate::analyzer::Analyzer;
use crate::analyzer::catalog::Catalog;
use crate::capture::{MessageRecord, Record};
use crate::config::ExtractorConfig;
use crate::error::DataQualityIssue;
use crate::stats::IssueTally;
use crate::types::{FieldId, SlotId};

use super::timeline::{SlotIdentity, SlotIdentityTimeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityField {
    Account,
    User,
}

/// Builds the [`SlotIdentityTimeline`] for a capture.
///
/// Construction wires every slot to the identifiers of its account and user
/// fields using the catalog. Feeding message records then records each
/// account/user change on the player resource entity at the tick it happened.
pub struct IdentityTimelineBuilder<'a> {
    catalog: &'a Catalog,
    resource_class: &'a str,
    /// identifier -> (slot, which id it carries)
    wiring: HashMap<FieldId, (SlotId, IdentityField)>,
    /// Most recent identity written per slot
    current: HashMap<SlotId, SlotIdentity>,
    timeline: SlotIdentityTimeline,
    changes: usize,
    issues: IssueTally,
}

impl<'a> IdentityTimelineBuilder<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a ExtractorConfig) -> Self {
        let span = span!(Level::DEBUG, "slot wiring");
        let _enter = span.enter();

        let mut issues = IssueTally::new();
        let mut defaults: HashMap<SlotId, SlotIdentity> = HashMap::new();
        let mut wiring = HashMap::new();

        let tables = [
            (config.account_table.as_str(), IdentityField::Account),
            (config.user_table.as_str(), IdentityField::User),
        ];
        for (table, kind) in tables {
            for field in catalog.fields_in_table(table) {
                // Fields of these tables are named after their slot: "001", "002", ...
                let Ok(slot) = field.name.trim().parse::<u32>().map(SlotId) else {
                    issues.record(DataQualityIssue::MalformedProperty {
                        identifier: field.identifier,
                        reason: format!("`{}` in {table} is not a slot number", field.name),
                    });
                    continue;
                };

                let identity = defaults
                    .entry(slot)
                    .or_insert_with(|| SlotIdentity::new(slot));
                match kind {
                    IdentityField::Account => identity.account_field = Some(field.identifier),
                    IdentityField::User => identity.user_field = Some(field.identifier),
                }
                wiring.insert(field.identifier, (slot, kind));
            }
        }

        let mut timeline = SlotIdentityTimeline::new();
        for identity in defaults.into_values() {
            timeline.register_slot(identity);
        }
        info!("wired {} identity fields across slots", wiring.len());

        Self {
            catalog,
            resource_class: &config.player_resource_class,
            wiring,
            current: HashMap::new(),
            timeline,
            changes: 0,
            issues,
        }
    }

    fn process_message(&mut self, message: &MessageRecord) {
        let tick = message.tick;
        for entity in message.entities() {
            if !self
                .catalog
                .class_is_named(entity.server_class, self.resource_class)
            {
                continue;
            }

            for prop in &entity.props {
                let Some(&(slot, kind)) = self.wiring.get(&prop.identifier) else {
                    continue;
                };

                let Some(value) = prop.value.as_i64() else {
                    self.issues.record(DataQualityIssue::MalformedProperty {
                        identifier: prop.identifier,
                        reason: format!("expected an integer id, got {:?}", prop.value),
                    });
                    continue;
                };

                // Start from whatever this slot last held so a tick that only
                // changes one of the two ids keeps the other.
                let identity = self.current.entry(slot).or_insert_with(|| {
                    self.timeline
                        .default_for(slot)
                        .copied()
                        .unwrap_or_else(|| SlotIdentity::new(slot))
                });
                match kind {
                    IdentityField::Account => identity.account_id = Some(value),
                    IdentityField::User => identity.user_id = Some(value),
                }

                trace!("slot {slot} at tick {tick}: {kind:?} = {value}");
                self.timeline.insert(tick, *identity);
                self.changes += 1;
            }
        }
    }

    pub fn timeline(&self) -> &SlotIdentityTimeline {
        &self.timeline
    }

    pub fn into_parts(self) -> (SlotIdentityTimeline, IssueTally) {
        (self.timeline, self.issues)
    }
}

impl Analyzer for IdentityTimelineBuilder<'_> {
    fn process(&mut self, record: &Record) {
        if let Record::Message(message) = record {
            self.process_message(message);
        }
    }

    fn finish(&mut self) {
        info!(
            "identity timeline has {} entries from {} id changes",
            self.timeline.entry_count(),
            self.changes
        );
    }
}
