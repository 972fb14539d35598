use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use adpilot_core::actions::Action;
use adpilot_core::domain::campaign::CustomerId;
use adpilot_core::domain::run::{NewRun, RunCompletion, RunId, RunRecord};

pub mod document;
pub mod memory;
pub mod run_log;

pub use document::SqlDocumentStore;
pub use memory::{InMemoryDocumentStore, InMemoryRunLogRepository};
pub use run_log::SqlRunLogRepository;

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("run `{0}` was not found")]
    NotFound(RunId),
    #[error("run `{0}` has already completed")]
    AlreadyCompleted(RunId),
}

/// A stored JSON document addressed by collection and id.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self { id: id.into(), data }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError>;

    async fn put_document(&self, collection: &str, document: Document)
        -> Result<(), RepositoryError>;
}

/// Persistence for agent run records.
///
/// A run is created in `running` state and moved to a terminal state exactly
/// once; a second completion fails with [`RepositoryError::AlreadyCompleted`].
#[async_trait]
pub trait RunLogRepository: Send + Sync {
    async fn log_run_start(&self, run: NewRun) -> Result<RunId, RepositoryError>;

    /// Appends one action to a run that is still in progress.
    async fn log_run_action(&self, run_id: &RunId, action: Action) -> Result<(), RepositoryError>;

    async fn log_run_complete(
        &self,
        run_id: &RunId,
        completion: RunCompletion,
    ) -> Result<(), RepositoryError>;

    /// Newest first. Dry runs are filtered out before `limit` applies.
    async fn get_run_history(
        &self,
        customer_id: &CustomerId,
        limit: u32,
        include_dry_runs: bool,
    ) -> Result<Vec<RunRecord>, RepositoryError>;

    async fn get_run(&self, run_id: &RunId) -> Result<Option<RunRecord>, RepositoryError>;
}
