//! Provider identifiers.
//!
//! Providers are keyed by a stable, human-chosen string (`"manual"`,
//! `"local-catalog"`, ...). Wrapping it in a newtype keeps provider keys from
//! being confused with external book IDs or search queries.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Unique, stable identifier of a metadata provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Wrap a provider key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the key is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProviderId {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn display_round_trips_through_from_str() {
        let id = ProviderId::new("local-catalog");
        let parsed: ProviderId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn blank_detection() {
        assert!(ProviderId::new("").is_blank());
        assert!(ProviderId::new("   ").is_blank());
        assert!(!ProviderId::new("manual").is_blank());
    }

    #[test]
    fn map_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ProviderId::new("manual"), 1);
        assert_eq!(map.get("manual"), Some(&1));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&ProviderId::new("manual")).unwrap();
        assert_eq!(json, "\"manual\"");
    }
}
