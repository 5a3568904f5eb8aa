use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::{info, warn};
use variantly::Variantly;

use crate::error::{DataQualityIssue, Error, Result};
use crate::types::{ClassId, FieldId, SlotId, Tick};

/// A 2- or 3-axis vector as it appears in property values.
///
/// Only the `{"x": .., "y": .., "z": ..}` form decodes as a vector. A plain
/// JSON list is an array value, whatever its length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl<'de> Deserialize<'de> for Vector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VectorVisitor;

        impl<'de> Visitor<'de> for VectorVisitor {
            type Value = Vector;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map with x, y and an optional z")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Vector, A::Error>
            where
                A: MapAccess<'de>,
            {
                let (mut x, mut y, mut z) = (None, None, None);
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "x" => x = Some(map.next_value()?),
                        "y" => y = Some(map.next_value()?),
                        "z" => z = map.next_value()?,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(Vector {
                    x: x.ok_or_else(|| de::Error::missing_field("x"))?,
                    y: y.ok_or_else(|| de::Error::missing_field("y"))?,
                    z,
                })
            }
        }

        deserializer.deserialize_map(VectorVisitor)
    }
}

/// A decoded property value.
///
/// Variant order matters for untagged decoding: integers must be tried before
/// floats so that `12` stays an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Variantly)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vector(Vector),
    Array(Vec<PropValue>),
}

impl PropValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Int(v) => Some(*v as f64),
            PropValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            // Some dumpers write integral props as floats
            PropValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }
}

/// A single field declaration inside a schema table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub identifier: FieldId,
    pub name: String,
    #[serde(default)]
    pub prop_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub props: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerClassDef {
    pub id: ClassId,
    pub name: String,
    pub data_table: String,
}

/// One `DataTables` record. Captures may contain several of these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaRecord {
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub server_classes: Vec<ServerClassDef>,
}

/// A property change on one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropChange {
    pub identifier: FieldId,
    pub value: PropValue,
    #[serde(default)]
    pub index: i64,
}

/// A property change whose value could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedProp {
    pub identifier: FieldId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawEntityUpdate")]
pub struct EntityUpdate {
    pub server_class: ClassId,
    pub entity_index: SlotId,
    pub props: Vec<PropChange>,
    /// Changes dropped because their value has no known shape
    #[serde(skip)]
    pub rejected: Vec<RejectedProp>,
}

#[derive(Deserialize)]
struct RawPropChange {
    identifier: FieldId,
    value: serde_json::Value,
    #[serde(default)]
    index: i64,
}

#[derive(Deserialize)]
struct RawEntityUpdate {
    server_class: ClassId,
    entity_index: SlotId,
    #[serde(default)]
    props: Vec<RawPropChange>,
}

impl From<RawEntityUpdate> for EntityUpdate {
    fn from(raw: RawEntityUpdate) -> Self {
        let mut props = Vec::with_capacity(raw.props.len());
        let mut rejected = Vec::new();
        for prop in raw.props {
            match serde_json::from_value::<PropValue>(prop.value) {
                Ok(value) => props.push(PropChange {
                    identifier: prop.identifier,
                    value,
                    index: prop.index,
                }),
                Err(e) => rejected.push(RejectedProp {
                    identifier: prop.identifier,
                    reason: e.to_string(),
                }),
            }
        }
        EntityUpdate {
            server_class: raw.server_class,
            entity_index: raw.entity_index,
            props,
            rejected,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacketEntities {
    #[serde(default)]
    pub entities: Vec<EntityUpdate>,
}

/// Sub-messages of a `Message` record. Only entity updates are decoded.
#[derive(Debug, Clone, Serialize, Deserialize, Variantly, strum_macros::IntoStaticStr)]
#[serde(tag = "type")]
pub enum Message {
    PacketEntities(PacketEntities),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub tick: Tick,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl MessageRecord {
    /// All entity updates carried by this record, across sub-messages.
    pub fn entities(&self) -> impl Iterator<Item = &EntityUpdate> {
        self.messages.iter().flat_map(|message| match message {
            Message::PacketEntities(packet) => packet.entities.as_slice(),
            Message::Other => &[],
        })
    }
}

/// A top-level capture record, discriminated by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, Variantly, strum_macros::IntoStaticStr)]
#[serde(tag = "type")]
pub enum Record {
    DataTables(SchemaRecord),
    Message(MessageRecord),
    /// `Signon`, `SyncTick`, `StringTables`, `ConsoleCmd` and anything newer.
    #[serde(other)]
    Other,
}

/// A fully materialized capture.
///
/// Records that fail to decode, and property changes whose value fails to
/// decode, are dropped at load time and remembered in `malformed` so they can
/// be reported alongside the extraction.
#[derive(Debug, Clone, Default)]
pub struct CaptureDocument {
    records: Vec<Record>,
    malformed: Vec<DataQualityIssue>,
}

impl CaptureDocument {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            malformed: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json_value(value)
    }

    pub fn from_json_slice(json: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(json)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Array(raw_records) = value else {
            return Err(Error::NotARecordArray);
        };

        let mut records = Vec::with_capacity(raw_records.len());
        let mut malformed = Vec::new();
        for (position, raw) in raw_records.into_iter().enumerate() {
            match serde_json::from_value::<Record>(raw) {
                Ok(record) => {
                    if let Record::Message(message) = &record {
                        for entity in message.entities() {
                            for prop in &entity.rejected {
                                let issue = DataQualityIssue::MalformedProperty {
                                    identifier: prop.identifier,
                                    reason: format!("tick {}: {}", message.tick, prop.reason),
                                };
                                warn!("{issue}");
                                malformed.push(issue);
                            }
                        }
                    }
                    records.push(record);
                }
                Err(e) => {
                    let issue = DataQualityIssue::MalformedRecord {
                        position,
                        reason: e.to_string(),
                    };
                    warn!("{issue}");
                    malformed.push(issue);
                }
            }
        }

        info!(
            "loaded capture with {} records ({} load issues)",
            records.len(),
            malformed.len()
        );

        Ok(Self { records, malformed })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Every issue raised while loading: dropped records and dropped
    /// property changes.
    pub fn malformed(&self) -> &[DataQualityIssue] {
        &self.malformed
    }

    pub fn malformed_record_count(&self) -> usize {
        self.malformed
            .iter()
            .filter(|issue| matches!(issue, DataQualityIssue::MalformedRecord { .. }))
            .count()
    }

    pub fn schema_records(&self) -> impl Iterator<Item = &SchemaRecord> {
        self.records.iter().filter_map(Record::data_tables_ref)
    }

    pub fn message_records(&self) -> impl Iterator<Item = &MessageRecord> {
        self.records.iter().filter_map(Record::message_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_values_by_shape() {
        let values: Vec<PropValue> =
            serde_json::from_value(json!([true, 12, 1.5, "red", {"x": 1.0, "y": 2.0}, [1, 2]]))
                .unwrap();
        assert_eq!(values[0], PropValue::Bool(true));
        assert_eq!(values[1], PropValue::Int(12));
        assert_eq!(values[2], PropValue::Float(1.5));
        assert_eq!(values[3], PropValue::String("red".to_string()));
        assert_eq!(
            values[4],
            PropValue::Vector(Vector {
                x: 1.0,
                y: 2.0,
                z: None
            })
        );
        assert_eq!(
            values[5],
            PropValue::Array(vec![PropValue::Int(1), PropValue::Int(2)])
        );
    }

    #[test]
    fn short_lists_stay_arrays() {
        let value: PropValue = serde_json::from_value(json!([1.5, 2.5, 3.5])).unwrap();
        assert_eq!(
            value,
            PropValue::Array(vec![
                PropValue::Float(1.5),
                PropValue::Float(2.5),
                PropValue::Float(3.5)
            ])
        );
        assert_eq!(serde_json::to_value(&value).unwrap(), json!([1.5, 2.5, 3.5]));

        let vector: PropValue =
            serde_json::from_value(json!({"x": 1, "y": 2, "z": 3})).unwrap();
        assert_eq!(
            vector,
            PropValue::Vector(Vector {
                x: 1.0,
                y: 2.0,
                z: Some(3.0)
            })
        );
    }

    #[test]
    fn undecodable_value_drops_only_its_change() {
        let doc = CaptureDocument::from_json_value(json!([
            {"type": "Message", "tick": 12, "messages": [
                {"type": "PacketEntities", "entities": [
                    {"server_class": 1, "entity_index": 2, "props": [
                        {"identifier": 30, "value": 150, "index": 0},
                        {"identifier": 31, "value": null, "index": 1}
                    ]}
                ]}
            ]}
        ]))
        .unwrap();

        assert_eq!(doc.records().len(), 1);
        assert_eq!(doc.malformed_record_count(), 0);
        assert_eq!(doc.malformed().len(), 1);
        assert!(matches!(
            doc.malformed()[0],
            DataQualityIssue::MalformedProperty {
                identifier: FieldId(31),
                ..
            }
        ));

        let entity = doc.message_records().next().unwrap().entities().next().unwrap();
        assert_eq!(entity.props.len(), 1);
        assert_eq!(entity.props[0].value, PropValue::Int(150));
        assert_eq!(entity.rejected[0].identifier, FieldId(31));
    }

    #[test]
    fn unknown_record_and_message_types_are_ignored() {
        let doc = CaptureDocument::from_json_value(json!([
            {"type": "Signon", "tick": 0},
            {"type": "Message", "tick": 3, "messages": [
                {"type": "NetTick", "frame_time": 15},
                {"type": "PacketEntities", "entities": [
                    {"server_class": 1, "entity_index": 2, "props": []}
                ]}
            ]}
        ]))
        .unwrap();

        assert!(doc.malformed().is_empty());
        assert!(doc.records()[0].is_other());
        let message = doc.message_records().next().unwrap();
        assert_eq!(message.tick, Tick(3));
        assert_eq!(message.entities().count(), 1);
    }

    #[test]
    fn malformed_records_are_skipped_individually() {
        let doc = CaptureDocument::from_json_value(json!([
            {"type": "Message", "messages": []},
            {"type": "DataTables", "tables": [{"name": "DT_X", "props": [
                {"identifier": "7", "name": "m_x", "prop_type": "Int"}
            ]}]}
        ]))
        .unwrap();

        assert_eq!(doc.records().len(), 1);
        assert_eq!(doc.malformed().len(), 1);
        assert!(matches!(
            doc.malformed()[0],
            DataQualityIssue::MalformedRecord { position: 0, .. }
        ));
        let schema = doc.schema_records().next().unwrap();
        assert_eq!(schema.tables[0].props[0].identifier, FieldId(7));
    }

    #[test]
    fn non_array_document_is_fatal() {
        assert!(matches!(
            CaptureDocument::from_json_str("{\"type\": \"Message\"}"),
            Err(Error::NotARecordArray)
        ));
    }
}
