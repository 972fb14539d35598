use thiserror::Error;

use crate::domain::strategy::StrategyType;

/// Rejections raised before anything is sent to the ads backend.
///
/// Display strings are returned verbatim to the deciding agent, so every
/// variant names the offending value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported bidding strategy type: {0}")]
    UnknownStrategy(String),
    #[error("Bidding strategy '{strategy}' is not allowed for channel type '{channel}'.")]
    StrategyNotAllowed { strategy: String, channel: String },
    #[error("{strategy} requires strategy detail `{key}`")]
    MissingDetail { strategy: StrategyType, key: &'static str },
    #[error("{strategy} strategy detail `{key}` must be {expected}")]
    InvalidDetail { strategy: StrategyType, key: &'static str, expected: &'static str },
    #[error(
        "Invalid target impression share location '{0}'. \
         Use ANYWHERE_ON_PAGE, TOP_OF_PAGE or ABSOLUTE_TOP_OF_PAGE."
    )]
    InvalidImpressionShareLocation(String),
    #[error("portfolio bidding strategies cannot link to another portfolio strategy ({0})")]
    PortfolioLinkNotSupported(String),
    #[error("Failed to apply bidding strategy details for type: {strategy} ({cause})")]
    StrategyNotApplied { strategy: String, cause: String },
    #[error("Invalid status provided: {0}. Use 'ENABLED' or 'PAUSED'.")]
    InvalidStatus(String),
    #[error(
        "Invalid location_id: '{0}'. Location ID must be a numeric string (e.g., '2840' for USA)"
    )]
    InvalidLocationId(String),
    #[error("Resource '{resource}' is not a {kind} owned by customer {customer_id}.")]
    ForeignResource { resource: String, kind: &'static str, customer_id: String },
    #[error("{field} must be greater than zero (got {value})")]
    NonPositiveAmount { field: &'static str, value: i64 },
    #[error("unsupported usecase `{0}` (expected google_ads|sa360)")]
    UnknownUsecase(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable label used in run records and CLI payloads.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::Configuration(_) => "configuration",
        }
    }
}
