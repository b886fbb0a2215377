//! Identity types.

use serde::{Deserialize, Serialize};

/// Number of leading characters kept by [`NetworkId::anonymize`].
const ANONYMIZED_PREFIX: usize = 6;

/// Network identifier of a device participating in cooperation.
///
/// Opaque to the engine: it is only ever compared, stored and handed back
/// to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shortened rendering suitable for logs and dumps.
    #[must_use]
    pub fn anonymize(&self) -> String {
        if self.0.chars().count() <= ANONYMIZED_PREFIX {
            return self.0.clone();
        }
        let prefix: String = self.0.chars().take(ANONYMIZED_PREFIX).collect();
        format!("{prefix}**")
    }
}

impl From<&str> for NetworkId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NetworkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process id of a client of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(pub i32);

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an input device known to the local input subsystem.
///
/// Virtual devices created for a remote peer get ids from the same space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub i32);

impl DeviceId {
    /// Events injected on behalf of a remote device carry no real device.
    pub const INVALID: Self = Self(-1);

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymize_short_id_is_unchanged() {
        assert_eq!(NetworkId::from("B").anonymize(), "B");
    }

    #[test]
    fn anonymize_long_id_keeps_prefix() {
        let id = NetworkId::from("0123456789abcdef");
        assert_eq!(id.anonymize(), "012345**");
    }

    #[test]
    fn network_id_serde_is_transparent() {
        let id = NetworkId::from("peer-b");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"peer-b\"");
        let decoded: NetworkId = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn device_id_validity() {
        assert!(DeviceId(3).is_valid());
        assert!(!DeviceId::INVALID.is_valid());
    }
}
