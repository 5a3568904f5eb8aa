use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Captures encode small integers either as JSON numbers or as numeric strings
/// (`"identifier": "1234"`), depending on which tool produced the dump.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// A discrete simulation step. Every message record in a capture carries one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Tick(pub u32);

impl Tick {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Tick {
    fn from(v: u32) -> Self {
        Tick(v)
    }
}

impl<'de> Deserialize<'de> for Tick {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_u32(deserializer).map(Tick)
    }
}

/// The numeric handle a capture uses in place of a field name.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldId(pub u32);

impl FieldId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FieldId {
    fn from(v: u32) -> Self {
        FieldId(v)
    }
}

impl<'de> Deserialize<'de> for FieldId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_u32(deserializer).map(FieldId)
    }
}

/// Server class identifier, stable for the whole capture.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

impl ClassId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ClassId {
    fn from(v: u32) -> Self {
        ClassId(v)
    }
}

impl<'de> Deserialize<'de> for ClassId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_u32(deserializer).map(ClassId)
    }
}

/// Positional entity index. Players occupy slots `1..=N`, and a slot is
/// reassigned whenever somebody leaves and somebody else joins.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<u32> for SlotId {
    fn from(v: u32) -> Self {
        SlotId(v)
    }
}

impl<'de> Deserialize<'de> for SlotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        lenient_u32(deserializer).map(SlotId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_accept_numbers_and_strings() {
        let from_number: FieldId = serde_json::from_str("1234").unwrap();
        let from_text: FieldId = serde_json::from_str("\" 1234\"").unwrap();
        assert_eq!(from_number, FieldId(1234));
        assert_eq!(from_text, FieldId(1234));
    }

    #[test]
    fn garbage_identifier_is_rejected() {
        assert!(serde_json::from_str::<Tick>("\"twelve\"").is_err());
        assert!(serde_json::from_str::<Tick>("-1").is_err());
    }

    #[test]
    fn slot_display_is_zero_padded() {
        assert_eq!(SlotId(2).to_string(), "002");
        assert_eq!(SlotId(100).to_string(), "100");
    }
}
