use tracing::{Level, debug, info, span, trace};

use crate::analyzer::Analyzer;
use crate::analyzer::catalog::Catalog;
use crate::analyzer::identity::SlotIdentityTimeline;
use crate::capture::{EntityUpdate, MessageRecord, Record};
use crate::config::{ExtractorConfig, TickIndexing};
use crate::error::DataQualityIssue;
use crate::snapshot::ExtractionResult;
use crate::stats::IssueTally;
use crate::steam_id::SteamId;
use crate::types::Tick;

/// Replays property changes on player entities and files each one under the
/// real player who held that slot at the time.
pub struct Attributor<'a> {
    catalog: &'a Catalog,
    timeline: &'a SlotIdentityTimeline,
    config: &'a ExtractorConfig,
    result: ExtractionResult,
    last_tick: Option<Tick>,
    issues: IssueTally,
}

impl<'a> Attributor<'a> {
    pub fn new(
        catalog: &'a Catalog,
        timeline: &'a SlotIdentityTimeline,
        config: &'a ExtractorConfig,
    ) -> Self {
        Self {
            catalog,
            timeline,
            config,
            result: ExtractionResult::new(),
            last_tick: None,
            issues: IssueTally::new(),
        }
    }

    /// Runs a full pass over `records`.
    pub fn attribute(mut self, records: &[Record]) -> (ExtractionResult, IssueTally) {
        let span = span!(Level::INFO, "attribution");
        let _enter = span.enter();

        self.process_all(records);
        self.into_parts()
    }

    fn process_message(&mut self, message: &MessageRecord) {
        let tick = message.tick;
        match self.last_tick {
            Some(previous) if tick < previous => {
                // Changes merge into the existing bucket for this tick
                self.issues
                    .record(DataQualityIssue::OutOfOrderTick { tick, previous });
            }
            _ => self.last_tick = Some(tick),
        }

        if self.config.tick_indexing == TickIndexing::Dense {
            self.result.ensure_tick(tick);
        }

        for entity in message.entities() {
            if self
                .catalog
                .class_is_named(entity.server_class, &self.config.player_class)
            {
                self.attribute_entity(tick, entity);
            }
        }
    }

    fn attribute_entity(&mut self, tick: Tick, entity: &EntityUpdate) {
        let slot = entity.entity_index;
        let Some(identity) = self.timeline.resolve(slot, tick) else {
            self.issues
                .record(DataQualityIssue::UnresolvedIdentity { slot, tick });
            return;
        };

        let account_id = match identity.account_id {
            Some(account_id) if account_id > self.config.bot_account_threshold => account_id,
            other => {
                debug!("slot {slot} at tick {tick} holds bot or placeholder account {other:?}");
                return;
            }
        };
        let Ok(account_id) = u32::try_from(account_id) else {
            self.issues.record(DataQualityIssue::MalformedProperty {
                identifier: identity.account_field.unwrap_or_default(),
                reason: format!("account id {account_id} is out of range"),
            });
            return;
        };
        let player = SteamId::from_account_id(account_id);

        let snapshot = self.result.snapshot_mut(tick, player);
        for prop in &entity.props {
            let Some(field) = self.catalog.lookup_field(prop.identifier) else {
                self.issues.record(DataQualityIssue::UnknownIdentifier {
                    identifier: prop.identifier,
                    tick,
                });
                continue;
            };
            if !self.config.is_relevant(&field.table) {
                continue;
            }

            trace!("{player} {}.{} = {:?}", field.table, field.name, prop.value);
            snapshot.apply(&field.table, &field.name, prop.value.clone());
        }
    }

    pub fn result(&self) -> &ExtractionResult {
        &self.result
    }

    pub fn into_parts(self) -> (ExtractionResult, IssueTally) {
        (self.result, self.issues)
    }
}

impl Analyzer for Attributor<'_> {
    fn process(&mut self, record: &Record) {
        if let Record::Message(message) = record {
            self.process_message(message);
        }
    }

    fn finish(&mut self) {
        info!(
            "attributed {} snapshots for {} players over {} ticks",
            self.result.snapshot_count(),
            self.result.players().len(),
            self.result.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::identity::IdentityTimelineBuilder;
    use crate::capture::{CaptureDocument, PropValue, Vector};
    use crate::config::ExtractorConfigBuilder;
    use serde_json::json;

    const RESOURCE: u32 = 249;
    const PLAYER: u32 = 247;

    fn schema() -> serde_json::Value {
        json!({
            "type": "DataTables",
            "tables": [
                {"name": "m_iAccountID", "props": [
                    {"identifier": 500, "name": "002", "prop_type": "Int"},
                    {"identifier": 510, "name": "003", "prop_type": "Int"}
                ]},
                {"name": "m_iUserID", "props": [
                    {"identifier": 501, "name": "002", "prop_type": "Int"},
                    {"identifier": 511, "name": "003", "prop_type": "Int"}
                ]},
                {"name": "DT_TFLocalPlayerExclusive", "props": [
                    {"identifier": 20, "name": "m_vecOrigin", "prop_type": "VectorXY"},
                    {"identifier": 21, "name": "m_vecOrigin[2]", "prop_type": "Float"}
                ]},
                {"name": "DT_BasePlayer", "props": [
                    {"identifier": 30, "name": "m_iHealth", "prop_type": "Int"}
                ]},
                {"name": "DT_TFPlayerResource", "props": [
                    {"identifier": 40, "name": "m_iPing", "prop_type": "Int"}
                ]}
            ],
            "server_classes": [
                {"id": RESOURCE, "name": "CTFPlayerResource", "data_table": "DT_TFPlayerResource"},
                {"id": PLAYER, "name": "CTFPlayer", "data_table": "DT_TFPlayer"}
            ]
        })
    }

    fn entities(tick: u32, entities: serde_json::Value) -> serde_json::Value {
        json!({"type": "Message", "tick": tick, "messages": [
            {"type": "PacketEntities", "entities": entities}
        ]})
    }

    fn run(config: &ExtractorConfig, messages: Vec<serde_json::Value>) -> (ExtractionResult, IssueTally) {
        let mut records = vec![schema()];
        records.extend(messages);
        let doc = CaptureDocument::from_json_value(serde_json::Value::Array(records)).unwrap();

        let mut catalog = Catalog::new();
        catalog.process_all(doc.records());
        let mut builder = IdentityTimelineBuilder::new(&catalog, config);
        builder.process_all(doc.records());
        let (timeline, _) = builder.into_parts();

        Attributor::new(&catalog, &timeline, config).attribute(doc.records())
    }

    fn join(tick: u32) -> serde_json::Value {
        entities(
            tick,
            json!([
                {"server_class": RESOURCE, "entity_index": 60, "props": [
                    {"identifier": 500, "value": 111216987, "index": 0},
                    {"identifier": 501, "value": 12, "index": 0},
                    {"identifier": 510, "value": 3, "index": 0},
                    {"identifier": 511, "value": 13, "index": 0}
                ]}
            ]),
        )
    }

    #[test]
    fn attributes_relevant_fields_to_player() {
        let config = ExtractorConfig::default();
        let (result, issues) = run(
            &config,
            vec![
                join(10),
                entities(
                    12,
                    json!([{"server_class": PLAYER, "entity_index": 2, "props": [
                        {"identifier": 20, "value": {"x": 1.0, "y": 2.0}, "index": 0},
                        {"identifier": 21, "value": 3.0, "index": 1},
                        {"identifier": 30, "value": 125, "index": 2},
                        {"identifier": 40, "value": 50, "index": 3}
                    ]}]),
                ),
            ],
        );

        let player = SteamId::from_account_id(111216987);
        let snapshot = result.snapshot(Tick(12), player).unwrap();
        assert_eq!(
            snapshot.get("DT_TFLocalPlayerExclusive", "m_vecOrigin"),
            Some(&PropValue::Vector(Vector {
                x: 1.0,
                y: 2.0,
                z: Some(3.0)
            }))
        );
        assert_eq!(snapshot.get("DT_BasePlayer", "m_iHealth"), Some(&PropValue::Int(125)));
        assert!(snapshot.table("DT_TFPlayerResource").is_none());
        assert!(issues.is_empty());
    }

    #[test]
    fn bots_are_never_reported() {
        let config = ExtractorConfig::default();
        let (result, _) = run(
            &config,
            vec![
                join(10),
                entities(
                    11,
                    json!([{"server_class": PLAYER, "entity_index": 3, "props": [
                        {"identifier": 30, "value": 100, "index": 0}
                    ]}]),
                ),
            ],
        );

        assert!(result.players().is_empty());
        assert!(result.tick(Tick(11)).unwrap().is_empty());
    }

    #[test]
    fn unresolved_and_unknown_are_skipped_and_counted() {
        let config = ExtractorConfig::default();
        let (result, issues) = run(
            &config,
            vec![
                entities(
                    5,
                    json!([{"server_class": PLAYER, "entity_index": 2, "props": [
                        {"identifier": 30, "value": 100, "index": 0}
                    ]}]),
                ),
                join(10),
                entities(
                    11,
                    json!([{"server_class": PLAYER, "entity_index": 2, "props": [
                        {"identifier": 999, "value": 1, "index": 0},
                        {"identifier": 30, "value": 90, "index": 1}
                    ]}]),
                ),
            ],
        );

        assert_eq!(issues.count("UnresolvedIdentity"), 1);
        assert_eq!(issues.count("UnknownIdentifier"), 1);
        assert!(result.tick(Tick(5)).unwrap().is_empty());
        let player = SteamId::from_account_id(111216987);
        assert_eq!(
            result.snapshot(Tick(11), player).unwrap().get("DT_BasePlayer", "m_iHealth"),
            Some(&PropValue::Int(90))
        );
    }

    #[test]
    fn out_of_order_tick_merges_into_existing_bucket() {
        let config = ExtractorConfig::default();
        let health = |tick: u32, value: i64| {
            entities(
                tick,
                json!([{"server_class": PLAYER, "entity_index": 2, "props": [
                    {"identifier": 30, "value": value, "index": 0}
                ]}]),
            )
        };
        let (result, issues) = run(&config, vec![join(10), health(20, 100), health(30, 90), health(20, 80)]);

        assert_eq!(issues.count("OutOfOrderTick"), 1);
        let player = SteamId::from_account_id(111216987);
        assert_eq!(
            result.snapshot(Tick(20), player).unwrap().get("DT_BasePlayer", "m_iHealth"),
            Some(&PropValue::Int(80))
        );
        assert!(result.snapshot(Tick(30), player).is_some());
    }

    #[test]
    fn sparse_indexing_drops_empty_ticks() {
        let config = ExtractorConfigBuilder::default()
            .tick_indexing(TickIndexing::Sparse)
            .build()
            .unwrap();
        let (result, _) = run(
            &config,
            vec![
                join(10),
                entities(11, json!([])),
                entities(
                    12,
                    json!([{"server_class": PLAYER, "entity_index": 2, "props": []}]),
                ),
            ],
        );

        let ticks: Vec<_> = result.ticks().map(|(tick, _)| tick).collect();
        assert_eq!(ticks, [Tick(12)]);
        let player = SteamId::from_account_id(111216987);
        assert!(result.snapshot(Tick(12), player).unwrap().is_empty());
    }
}
