//! Aggregate identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of an aggregate root.
///
/// Opaque to everything but the command side that mints it. Ids arriving from
/// the wire are accepted as-is as long as they are non-blank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregateId(String);

impl AggregateId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered), so listing by id roughly follows creation
    /// order. Prefer passing IDs explicitly in tests for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AggregateId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(DomainError::invalid_id("AggregateId: must not be blank"));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for AggregateId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(DomainError::invalid_id("AggregateId: must not be blank"));
        }
        Ok(Self(value))
    }
}

impl From<AggregateId> for String {
    fn from(value: AggregateId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_parse_back() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().parse::<AggregateId>().unwrap(), a);
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!("".parse::<AggregateId>().is_err());
        assert!("   ".parse::<AggregateId>().is_err());
        assert!(serde_json::from_str::<AggregateId>("\"\"").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id: AggregateId = "todo-1".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"todo-1\"");
    }
}
