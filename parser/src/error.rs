use thiserror::Error;

use crate::types::{ClassId, FieldId, SlotId, Tick};

#[derive(Debug, Error)]
pub enum Error {
    #[error("capture document is not a JSON array of records")]
    NotARecordArray,
    #[error("failed to decode capture JSON")]
    Json(#[from] serde_json::Error),
    #[error("invalid steam id")]
    SteamId(#[from] SteamIdError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SteamIdError {
    #[error("`{0}` is not a recognised steam id format")]
    UnknownFormat(String),
    #[error("`{0}` has a non-numeric component")]
    BadNumber(String),
    #[error("{0} is below the individual account base")]
    OutOfRange(u64),
}

/// Recoverable data-quality problems found while processing a capture.
///
/// None of these stop a run. Each one is logged where it is raised and
/// tallied in [`crate::ExtractionStats`].
#[derive(Debug, Clone, PartialEq, Error, strum_macros::IntoStaticStr)]
pub enum DataQualityIssue {
    #[error("identifier {identifier} redefined from {old_table}.{old_name} to {new_table}.{new_name}")]
    SchemaConflict {
        identifier: FieldId,
        old_table: String,
        old_name: String,
        new_table: String,
        new_name: String,
    },
    #[error("class {class_id} redefined as {new_name}, keeping {old_name}")]
    ClassConflict {
        class_id: ClassId,
        old_name: String,
        new_name: String,
    },
    #[error("unknown or unseen identifier {identifier} at tick {tick}")]
    UnknownIdentifier { identifier: FieldId, tick: Tick },
    #[error("slot {slot} has no identity yet at tick {tick}")]
    UnresolvedIdentity { slot: SlotId, tick: Tick },
    #[error("tick {tick} arrived after tick {previous}")]
    OutOfOrderTick { tick: Tick, previous: Tick },
    #[error("malformed record #{position}: {reason}")]
    MalformedRecord { position: usize, reason: String },
    #[error("malformed value for identifier {identifier}: {reason}")]
    MalformedProperty { identifier: FieldId, reason: String },
}

impl DataQualityIssue {
    /// Stable name of the issue kind, used as the tally key.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}
