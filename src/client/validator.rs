//! Boundary classification of upstream response bodies.

use crate::mapping::lenient;
use serde_json::{json, Value};

/// Where a payload reports an application-level failure despite a 2xx status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureProbe {
    /// JSON pointer to the status field, e.g. `/headers/status`
    pub status_at: String,
    /// Status value that signals failure
    pub failed_value: String,
    /// JSON pointer to the human-readable message
    pub message_at: String,
}

impl FailureProbe {
    #[must_use]
    pub fn new(status_at: &str, failed_value: &str, message_at: &str) -> Self {
        Self {
            status_at: status_at.to_string(),
            failed_value: failed_value.to_string(),
            message_at: message_at.to_string(),
        }
    }

    fn check(&self, body: &Value) -> Option<String> {
        let status = body.pointer(&self.status_at)?.as_str()?;
        if status != self.failed_value {
            return None;
        }
        Some(
            body.pointer(&self.message_at)
                .and_then(lenient::value_to_string)
                .unwrap_or_else(|| "Unknown API error".to_string()),
        )
    }
}

/// Expected shape of a JSON endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseShape {
    /// JSON pointer to the results list; empty string means the whole body
    pub results_at: String,
    pub failure: Option<FailureProbe>,
}

impl Default for ResponseShape {
    fn default() -> Self {
        Self::results_at("/results")
    }
}

impl ResponseShape {
    #[must_use]
    pub fn results_at(pointer: &str) -> Self {
        Self {
            results_at: pointer.to_string(),
            failure: None,
        }
    }

    #[must_use]
    pub fn with_failure(mut self, probe: FailureProbe) -> Self {
        self.failure = Some(probe);
        self
    }
}

/// Known shapes of an upstream body, classified once at the boundary
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    /// At least one result record
    Results { body: Value, results: Vec<Value> },
    /// Valid body without results, or without the results field at all
    Empty { body: Value },
    /// Upstream flagged a failure inside an otherwise valid body
    ApplicationError(String),
    /// Body is not usable JSON
    Malformed(String),
}

impl UpstreamPayload {
    /// Classify a raw response body against the expected shape
    #[must_use]
    pub fn classify(text: &str, shape: &ResponseShape) -> Self {
        let body: Value = match serde_json::from_str(text) {
            Ok(body) => body,
            Err(e) => return Self::Malformed(e.to_string()),
        };

        if body.is_null() {
            return Self::Malformed("empty response from server".to_string());
        }

        if let Some(message) = shape.failure.as_ref().and_then(|probe| probe.check(&body)) {
            return Self::ApplicationError(message);
        }

        // Bare lists are the results themselves
        if let Value::Array(results) = body {
            return if results.is_empty() {
                Self::Empty {
                    body: json!({ "results": [] }),
                }
            } else {
                Self::Results {
                    body: json!({ "results": results.clone() }),
                    results,
                }
            };
        }

        let results = body
            .pointer(&shape.results_at)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if results.is_empty() {
            Self::Empty { body }
        } else {
            Self::Results { body, results }
        }
    }
}

/// Normalized body with its results list resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResponse {
    pub body: Value,
    pub results: Vec<Value>,
}

impl ValidatedResponse {
    /// Unsigned number at a JSON pointer, accepting numeric strings
    #[must_use]
    pub fn count_at(&self, pointer: &str) -> Option<u64> {
        self.body
            .pointer(pointer)
            .and_then(lenient::value_to_f64)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u64)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.results.first()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
