use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::game_constants;

/// Whether ticks without any attributed player still get an (empty) entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickIndexing {
    /// Every message tick appears in the result
    #[default]
    Dense,
    /// Only ticks with at least one attributed player appear
    Sparse,
}

/// Extraction settings, loadable from a TOML file.
///
/// All fields default to the values for TF2 captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default)]
pub struct ExtractorConfig {
    #[builder(setter(into))]
    pub player_class: String,
    #[builder(setter(into))]
    pub player_resource_class: String,
    #[builder(setter(into))]
    pub account_table: String,
    #[builder(setter(into))]
    pub user_table: String,
    pub relevant_tables: BTreeSet<String>,
    pub bot_account_threshold: i64,
    pub tick_indexing: TickIndexing,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            player_class: game_constants::PLAYER_CLASS.to_string(),
            player_resource_class: game_constants::PLAYER_RESOURCE_CLASS.to_string(),
            account_table: game_constants::ACCOUNT_ID_TABLE.to_string(),
            user_table: game_constants::USER_ID_TABLE.to_string(),
            relevant_tables: game_constants::RELEVANT_TABLES
                .iter()
                .map(|table| table.to_string())
                .collect(),
            bot_account_threshold: game_constants::BOT_ACCOUNT_THRESHOLD,
            tick_indexing: TickIndexing::Dense,
        }
    }
}

impl ExtractorConfig {
    pub fn is_relevant(&self, table: &str) -> bool {
        self.relevant_tables.contains(table)
    }

    /// Generate a commented default TOML config string.
    pub fn generate_default_toml() -> String {
        let tables = game_constants::RELEVANT_TABLES
            .iter()
            .map(|table| format!("    \"{table}\","))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"# demo-pivot extraction configuration

# Server class of each player's own entity
player_class = "{player}"

# Server class carrying the per-slot account/user id arrays
player_resource_class = "{resource}"

# Tables whose slot-named fields hold account and user ids
account_table = "{account}"
user_table = "{user}"

# Account ids at or below this value are bots and are never reported
bot_account_threshold = {threshold}

# "dense" keeps every tick in the output, "sparse" drops ticks with no players
tick_indexing = "dense"

# Only fields from these tables are kept in player snapshots
relevant_tables = [
{tables}
]
"#,
            player = game_constants::PLAYER_CLASS,
            resource = game_constants::PLAYER_RESOURCE_CLASS,
            account = game_constants::ACCOUNT_ID_TABLE,
            user = game_constants::USER_ID_TABLE,
            threshold = game_constants::BOT_ACCOUNT_THRESHOLD,
        )
    }
}
