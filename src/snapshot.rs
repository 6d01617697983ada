use crate::error::TransportError;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

static NULL: Value = Value::Null;

/// Outcome of one source within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    /// Decoded payload, `Null` when the call failed
    pub value: Value,
    /// Why the call failed, if it did
    pub error: Option<TransportError>,
}

impl SourceEntry {
    #[must_use]
    pub fn ok(value: Value) -> Self {
        Self { value, error: None }
    }

    #[must_use]
    pub fn failed(error: TransportError) -> Self {
        Self {
            value: Value::Null,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<Result<Value, TransportError>> for SourceEntry {
    fn from(result: Result<Value, TransportError>) -> Self {
        match result {
            Ok(value) => SourceEntry::ok(value),
            Err(e) => SourceEntry::failed(e),
        }
    }
}

impl Serialize for SourceEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SourceEntry", 3)?;
        state.serialize_field("value", &self.value)?;
        state.serialize_field("error", &self.error.as_ref().map(ToString::to_string))?;
        state.serialize_field("error_kind", &self.error.as_ref().map(TransportError::kind))?;
        state.end()
    }
}

/// Everything fetched in one cycle, keyed by source name.
///
/// Built once and never mutated; the coordinator swaps whole snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Cycle that produced this snapshot, 0 before the first success
    pub cycle: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub sources: BTreeMap<String, SourceEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Snapshot {
    /// The snapshot visible before the first successful cycle.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            cycle: 0,
            fetched_at: None,
            sources: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn new(cycle: u64, sources: BTreeMap<String, SourceEntry>) -> Self {
        Self {
            cycle,
            fetched_at: Some(Utc::now()),
            sources,
        }
    }

    /// Payload of a source, `Null` when it is absent or failed.
    #[must_use]
    pub fn source(&self, name: &str) -> &Value {
        self.sources.get(name).map_or(&NULL, |entry| &entry.value)
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.get(name)
    }

    /// Names of sources whose call failed in this cycle.
    #[must_use]
    pub fn degraded_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|(_, entry)| !entry.is_ok())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
