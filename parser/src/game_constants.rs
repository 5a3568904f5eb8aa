//! Names the Team Fortress 2 network schema uses for the things this crate
//! needs to find. All of them can be overridden through
//! [`crate::ExtractorConfig`].

/// Server class of a player's own entity.
pub const PLAYER_CLASS: &str = "CTFPlayer";

/// Server class of the entity carrying per-slot account and user ids.
pub const PLAYER_RESOURCE_CLASS: &str = "CTFPlayerResource";

/// Table whose fields are named after slots (`"001"`, `"002"`, ...) and hold
/// each slot's account id.
pub const ACCOUNT_ID_TABLE: &str = "m_iAccountID";

/// Same layout as [`ACCOUNT_ID_TABLE`], holding each slot's user id.
pub const USER_ID_TABLE: &str = "m_iUserID";

/// Bots and replay placeholders get account ids in `1..=100`; anything at or
/// below this value is not a real player.
pub const BOT_ACCOUNT_THRESHOLD: i64 = 256;

/// Tables retained in player snapshots unless configured otherwise.
pub const RELEVANT_TABLES: &[&str] = &[
    "DT_Local",
    "DT_LocalPlayerExclusive",
    "DT_TFLocalPlayerExclusive",
    "DT_BaseEntity",
    "DT_PlayerState",
    "DT_TFPlayerClassShared",
    "DT_TFPlayerShared",
    "m_iAmmo",
    "DT_TFPlayerScoringDataExclusive",
    "DT_TFPlayer",
    "DT_BasePlayer",
];
