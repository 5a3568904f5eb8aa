//! Conversions between the account value stored in a capture and the
//! canonical 64-bit steam identity, plus its two textual forms.
//!
//! ```text
//! 64-bit   76561198071482715
//! Steam3   [U:1:111216987]
//! Steam2   STEAM_0:1:55608493
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SteamIdError;

/// Offset between an individual account number and its 64-bit id.
pub const STEAM_ID_64_BASE: u64 = 76561197960265728;

/// Canonical, session-independent player identity.
///
/// Always at or above [`STEAM_ID_64_BASE`]; deserialization enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u64", try_from = "u64")]
pub struct SteamId(u64);

impl SteamId {
    pub fn from_account_id(account_id: u32) -> Self {
        SteamId(STEAM_ID_64_BASE + account_id as u64)
    }

    pub fn from_steam_id64(id: u64) -> Result<Self, SteamIdError> {
        if id < STEAM_ID_64_BASE {
            return Err(SteamIdError::OutOfRange(id));
        }
        Ok(SteamId(id))
    }

    pub fn steam_id64(self) -> u64 {
        self.0
    }

    /// The account number, i.e. what the capture stores in `m_iAccountID`.
    pub fn account_id(self) -> u64 {
        self.0 - STEAM_ID_64_BASE
    }

    pub fn to_steam2(self) -> String {
        let account = self.account_id();
        format!("STEAM_0:{}:{}", account % 2, account / 2)
    }

    pub fn to_steam3(self) -> String {
        format!("[U:1:{}]", self.account_id())
    }

    pub fn profile_url(self) -> String {
        format!("https://steamcommunity.com/profiles/{}", self.0)
    }

    fn parse_component(text: &str, original: &str) -> Result<u64, SteamIdError> {
        text.parse()
            .map_err(|_| SteamIdError::BadNumber(original.to_string()))
    }

    fn from_account_number(account: u64) -> Result<Self, SteamIdError> {
        STEAM_ID_64_BASE
            .checked_add(account)
            .map(SteamId)
            .ok_or(SteamIdError::OutOfRange(account))
    }
}

impl TryFrom<u64> for SteamId {
    type Error = SteamIdError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        SteamId::from_steam_id64(id)
    }
}

impl From<SteamId> for u64 {
    fn from(id: SteamId) -> Self {
        id.0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_steam3())
    }
}

impl FromStr for SteamId {
    type Err = SteamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if let Some(rest) = trimmed.strip_prefix("STEAM_") {
            // STEAM_X:Y:Z, the universe digit X is ignored
            let mut parts = rest.split(':');
            let (Some(_universe), Some(y), Some(z), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(SteamIdError::UnknownFormat(s.to_string()));
            };
            let y = Self::parse_component(y, s)?;
            let z = Self::parse_component(z, s)?;
            if y > 1 {
                return Err(SteamIdError::BadNumber(s.to_string()));
            }
            let account = z
                .checked_mul(2)
                .and_then(|doubled| doubled.checked_add(y))
                .ok_or(SteamIdError::OutOfRange(z))?;
            return Self::from_account_number(account);
        }

        if let Some(inner) = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let Some(account) = inner.strip_prefix("U:1:") else {
                return Err(SteamIdError::UnknownFormat(s.to_string()));
            };
            let account = Self::parse_component(account, s)?;
            return Self::from_account_number(account);
        }

        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return SteamId::from_steam_id64(Self::parse_component(trimmed, s)?);
        }

        Err(SteamIdError::UnknownFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_account_converts() {
        let id = SteamId::from_account_id(111216987);
        assert_eq!(id.steam_id64(), 76561198071482715);
        assert_eq!(id.to_steam3(), "[U:1:111216987]");
        assert_eq!(id.to_steam2(), "STEAM_0:1:55608493");
        assert_eq!(
            id.profile_url(),
            "https://steamcommunity.com/profiles/76561198071482715"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            "not an id".parse::<SteamId>(),
            Err(SteamIdError::UnknownFormat(_))
        ));
        assert!(matches!(
            "[U:1:abc]".parse::<SteamId>(),
            Err(SteamIdError::BadNumber(_))
        ));
        assert!(matches!(
            "STEAM_0:2:10".parse::<SteamId>(),
            Err(SteamIdError::BadNumber(_))
        ));
        assert!(matches!(
            "12".parse::<SteamId>(),
            Err(SteamIdError::OutOfRange(12))
        ));
        assert!(matches!(
            "STEAM_0:1:18446744073709551615".parse::<SteamId>(),
            Err(SteamIdError::OutOfRange(_))
        ));
        assert!(matches!(
            "[U:1:18446744073709551615]".parse::<SteamId>(),
            Err(SteamIdError::OutOfRange(_))
        ));
    }

    #[test]
    fn serializes_as_plain_number() {
        let id = SteamId::from_account_id(1);
        assert_eq!(serde_json::to_string(&id).unwrap(), "76561197960265729");
        let back: SteamId = serde_json::from_str("76561197960265729").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn deserializing_below_base_is_an_error() {
        assert!(serde_json::from_str::<SteamId>("1").is_err());
    }

    proptest! {
        #[test]
        fn every_form_round_trips(account in 257u32..=u32::MAX) {
            let id = SteamId::from_account_id(account);
            prop_assert_eq!(id.account_id(), account as u64);
            prop_assert_eq!(id.to_steam2().parse::<SteamId>().unwrap(), id);
            prop_assert_eq!(id.to_steam3().parse::<SteamId>().unwrap(), id);
            prop_assert_eq!(id.steam_id64().to_string().parse::<SteamId>().unwrap(), id);
        }
    }
}
