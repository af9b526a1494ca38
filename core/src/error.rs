use chrono::NaiveDate;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the health record engine.
///
/// A stale write is not represented here: it is reported as
/// [`WriteStatus::Skipped`](crate::models::WriteStatus::Skipped).
#[derive(Debug, Error)]
pub enum HealthError {
    /// A field could not be parsed or is out of range.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// No record is stored for the requested date.
    #[error("no record for {0}")]
    NotFound(NaiveDate),

    /// The underlying store failed.
    #[error("{context}")]
    Storage {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl HealthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn storage(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T, E = HealthError> = std::result::Result<T, E>;
