use serde::{Deserialize, Serialize};
use thiserror::Error;

use adpilot_core::errors::ValidationError;

/// Error codes the Ads API documents as safe to retry unchanged.
const RETRYABLE_CODES: &[&str] = &[
    "INTERNAL_ERROR",
    "TRANSIENT_ERROR",
    "RESOURCE_EXHAUSTED",
    "RESOURCE_TEMPORARILY_EXHAUSTED",
    "DEADLINE_EXCEEDED",
    "CONCURRENT_MODIFICATION",
];

/// One entry of a `GoogleAdsFailure`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdsApiError {
    /// Error family, e.g. `campaignBudgetError`.
    pub category: String,
    /// Enum value within the family, e.g. `NON_MULTIPLE_OF_MINIMUM_CURRENCY_UNIT`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<String>,
}

impl AdsApiError {
    pub fn is_retryable(&self) -> bool {
        RETRYABLE_CODES.contains(&self.code.as_str())
    }
}

fn summarize(errors: &[AdsApiError]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|error| format!("{}.{}: {}", error.category, error.code, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Google Ads API rejected the request: {}", summarize(.errors))]
    Rejected { errors: Vec<AdsApiError> },
    #[error("{0} was not found")]
    NotFound(String),
    #[error("Google Ads API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("invalid query input: {0}")]
    InvalidQuery(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode Google Ads response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rejected { errors } => errors.iter().any(AdsApiError::is_retryable),
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) => true,
            Self::NotFound(_) | Self::InvalidQuery(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Failure of a campaign mutation tool.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Lookup(String),
    #[error("Failed to {operation}: {}", summarize(.errors))]
    Rejected { operation: &'static str, errors: Vec<AdsApiError> },
    #[error("Failed to {operation}: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
}

impl UpdateError {
    /// Lifts a backend failure, keeping structured API errors addressable.
    pub fn from_backend(operation: &'static str, error: BackendError) -> Self {
        match error {
            BackendError::Rejected { errors } => Self::Rejected { operation, errors },
            source => Self::Backend { operation, source },
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Lookup(_) => false,
            Self::Rejected { errors, .. } => errors.iter().any(AdsApiError::is_retryable),
            Self::Backend { source, .. } => source.is_retryable(),
        }
    }

    pub fn api_errors(&self) -> &[AdsApiError] {
        match self {
            Self::Rejected { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Lookup(_) => "lookup",
            Self::Rejected { .. } | Self::Backend { .. } => "integration",
        }
    }
}

#[cfg(test)]
mod tests {
    use adpilot_core::errors::ValidationError;

    use super::{AdsApiError, BackendError, UpdateError};

    fn api_error(code: &str) -> AdsApiError {
        AdsApiError {
            category: "internalError".to_string(),
            code: code.to_string(),
            message: "try again".to_string(),
            trigger: None,
            field_path: None,
        }
    }

    #[test]
    fn rejections_keep_structured_errors_and_classify_retries() {
        let error = UpdateError::from_backend(
            "update campaign budget",
            BackendError::Rejected { errors: vec![api_error("TRANSIENT_ERROR")] },
        );

        assert!(error.is_retryable());
        assert_eq!(error.api_errors().len(), 1);
        assert!(error.to_string().starts_with("Failed to update campaign budget: internalError"));
    }

    #[test]
    fn validation_and_permanent_failures_are_not_retryable() {
        let validation = UpdateError::from(ValidationError::InvalidStatus("ON".to_string()));
        assert!(!validation.is_retryable());
        assert_eq!(validation.error_class(), "validation");

        let permanent = UpdateError::from_backend(
            "update campaign",
            BackendError::Rejected {
                errors: vec![api_error("OPERATION_NOT_PERMITTED_FOR_CONTEXT")],
            },
        );
        assert!(!permanent.is_retryable());

        let throttled = UpdateError::from_backend(
            "update campaign",
            BackendError::Http { status: 429, message: "slow down".to_string() },
        );
        assert!(throttled.is_retryable());
        assert!(throttled.api_errors().is_empty());
    }
}
