//! Per-session adapter state.
//!
//! The host owns one [`SourceContext`] per enabled source and passes it to every
//! operation. It carries the credential rotation cursor and an opaque key/value
//! bag that the host persists between sessions.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque key/value state, round-tripped through JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceState(Map<String, Value>);

impl SourceState {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Session-owned state passed `&mut` into every source operation
#[derive(Debug, Clone, Default)]
pub struct SourceContext {
    credential_cursor: usize,
    state: SourceState,
}

impl SourceContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a context from state saved by [`SourceContext::save`].
    ///
    /// A missing or blank blob starts a fresh session.
    pub fn restore(saved: Option<&str>) -> Result<Self> {
        let state = match saved.map(str::trim).filter(|s| !s.is_empty()) {
            Some(blob) => serde_json::from_str::<SourceState>(blob).map_err(|e| {
                Error::invalid_input("saved_state", format!("not a JSON object: {e}"))
            })?,
            None => SourceState::default(),
        };

        Ok(Self {
            credential_cursor: 0,
            state,
        })
    }

    /// Serialize the opaque state for the host to persist
    pub fn save(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }

    #[must_use]
    pub const fn credential_cursor(&self) -> usize {
        self.credential_cursor
    }

    pub fn set_credential_cursor(&mut self, cursor: usize) {
        self.credential_cursor = cursor;
    }

    #[must_use]
    pub const fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SourceState {
        &mut self.state
    }
}
