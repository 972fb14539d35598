use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actions::Action;
use crate::domain::campaign::CustomerId;
use crate::errors::ValidationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Placeholder used when the run record could not be created.
    pub fn temporary(at: DateTime<Utc>) -> Self {
        Self(format!("temp-{}", at.timestamp_millis()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with("temp-")
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Cancelled,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "cancelled" => Some(Self::Cancelled),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usecase {
    GoogleAds,
    Sa360,
}

impl Usecase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoogleAds => "google_ads",
            Self::Sa360 => "sa360",
        }
    }

    /// Document collection holding the per-customer campaign list.
    pub fn config_collection(self) -> &'static str {
        match self {
            Self::GoogleAds => "GoogleAdsConfig",
            Self::Sa360 => "SA360Config",
        }
    }
}

impl fmt::Display for Usecase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Usecase {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google_ads" | "googleads" => Ok(Self::GoogleAds),
            "sa360" => Ok(Self::Sa360),
            _ => Err(ValidationError::UnknownUsecase(value.to_owned())),
        }
    }
}

/// Inputs captured when a run starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRun {
    pub customer_id: CustomerId,
    pub usecase: Usecase,
    pub dry_run: bool,
    pub triggered_by: String,
}

impl NewRun {
    pub fn into_record(self, run_id: RunId, started_at: DateTime<Utc>) -> RunRecord {
        RunRecord {
            run_id,
            customer_id: self.customer_id,
            usecase: self.usecase,
            dry_run: self.dry_run,
            triggered_by: self.triggered_by,
            status: RunStatus::Running,
            started_at,
            completed_at: None,
            actions: Vec::new(),
            summary: None,
            error: None,
        }
    }
}

/// Terminal state written once when a run ends.
#[derive(Clone, Debug, PartialEq)]
pub struct RunCompletion {
    pub status: RunStatus,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub customer_id: CustomerId,
    pub usecase: Usecase,
    pub dry_run: bool,
    pub triggered_by: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actions: Vec<Action>,
    pub summary: Option<String>,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn apply_completion(&mut self, completion: RunCompletion, completed_at: DateTime<Utc>) {
        self.status = completion.status;
        self.summary = completion.summary;
        self.error = completion.error;
        self.actions = completion.actions;
        self.completed_at = Some(completed_at);
    }
}
