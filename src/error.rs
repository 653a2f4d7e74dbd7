use thiserror::Error;

/// Error categorization shared by every adapter
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (permanent failures)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors (usually permanent)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // Network errors (transient - should retry)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Upstream answered with a non-2xx status
    #[error("Request failed: {status} - {status_text}")]
    RequestFailed { status: u16, status_text: String },

    // Upstream answered 2xx but flagged a failure inside the payload
    #[error("API error: {0}")]
    ApiError(String),

    // Malformed bodies are not expected to self-heal
    #[error("Invalid response from {context}: {message}")]
    InvalidResponse { context: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("No playable streams found for {id}: {reason}")]
    NoPlayableStreams { id: String, reason: String },

    // Client errors (permanent - don't retry)
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Operation {operation} is not supported by {source_id}")]
    Unsupported {
        source_id: String,
        operation: String,
    },

    // Single upstream record that cannot be mapped; absorbed by batch mappers
    #[error("Unmappable {record} record: {reason}")]
    UnmappableRecord { record: String, reason: String },
}

/// Error categorization for retry strategies and host propagation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Permanent errors - should not retry
    Permanent,
    /// Transient errors - safe to retry
    Transient,
    /// Rate limited or credential rejected - retry with another credential
    RateLimited,
    /// Upstream body could not be understood - do not retry
    Malformed,
    /// The looked-up entity does not exist
    NotFound,
    /// A single record was dropped from an otherwise valid batch
    PartialMapping,
}

impl Error {
    /// Categorize error for retry logic
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_)
            | Self::InvalidInput { .. }
            | Self::Unsupported { .. } => ErrorCategory::Permanent,

            Self::InvalidResponse { .. } | Self::Serde(_) => ErrorCategory::Malformed,

            Self::NotFound { .. } | Self::NoPlayableStreams { .. } => ErrorCategory::NotFound,

            Self::UnmappableRecord { .. } => ErrorCategory::PartialMapping,

            Self::RequestFailed { status, .. } => match *status {
                401 | 403 | 429 => ErrorCategory::RateLimited,
                408 => ErrorCategory::Transient,
                404 | 410 => ErrorCategory::NotFound,
                400..=499 => ErrorCategory::Permanent,
                // 5xx and anything unexpected
                _ => ErrorCategory::Transient,
            },

            Self::Http(_) | Self::ApiError(_) => ErrorCategory::Transient,
        }
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::RateLimited
        )
    }

    /// Whether the host should read this as "nothing found" rather than a failure
    pub const fn is_not_found(&self) -> bool {
        matches!(self.category(), ErrorCategory::NotFound)
    }

    pub(crate) fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        }
    }

    pub(crate) fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
