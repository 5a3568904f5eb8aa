pub mod analyzer;
pub mod capture;
pub mod config;
mod error;
pub mod extractor;
pub mod game_constants;
pub mod snapshot;
pub mod stats;
pub mod steam_id;
pub mod types;

pub use capture::CaptureDocument;
pub use config::{ExtractorConfig, ExtractorConfigBuilder, TickIndexing};
pub use error::*;
pub use extractor::{Extraction, Extractor, extract};
pub use snapshot::{ExtractionResult, PlayerSnapshot};
pub use stats::{ExtractionStats, IssueTally};
pub use steam_id::SteamId;
