//! Exchange sequencing policies.

use serde::{Deserialize, Serialize};

/// How an exchange lets a client prove its book is still in sync.
///
/// Passed as data to the applier and validator; a new exchange picks a
/// variant instead of adding a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequencingPolicy {
    /// Strict update-id continuity (Binance-style depth streams).
    #[default]
    UpdateId,
    /// Checksum over the top `depth` levels after each update (OKX-style).
    Checksum {
        /// Levels per side included in the checksum.
        depth: usize,
    },
}

impl SequencingPolicy {
    /// Levels per side covered by OKX-style checksums.
    pub const DEFAULT_CHECKSUM_DEPTH: usize = 25;

    /// Checksum policy with the default depth.
    #[must_use]
    pub const fn checksum() -> Self {
        Self::Checksum {
            depth: Self::DEFAULT_CHECKSUM_DEPTH,
        }
    }

    /// Returns true if every update must continue the previous id exactly.
    #[must_use]
    pub const fn requires_id_continuity(&self) -> bool {
        matches!(self, Self::UpdateId)
    }

    /// Returns the checksum depth, if this policy validates checksums.
    #[must_use]
    pub const fn checksum_depth(&self) -> Option<usize> {
        match self {
            Self::UpdateId => None,
            Self::Checksum { depth } => Some(*depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_id_policy() {
        let policy = SequencingPolicy::UpdateId;
        assert!(policy.requires_id_continuity());
        assert_eq!(policy.checksum_depth(), None);
    }

    #[test]
    fn test_checksum_policy() {
        let policy = SequencingPolicy::checksum();
        assert!(!policy.requires_id_continuity());
        assert_eq!(policy.checksum_depth(), Some(25));
    }

    #[test]
    fn test_default_is_update_id() {
        assert_eq!(SequencingPolicy::default(), SequencingPolicy::UpdateId);
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&SequencingPolicy::Checksum { depth: 5 }).unwrap();
        assert_eq!(json, r#"{"kind":"checksum","depth":5}"#);
    }
}
