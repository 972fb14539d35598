use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use adpilot_core::actions::Action;
use adpilot_core::domain::campaign::CustomerId;
use adpilot_core::domain::run::{NewRun, RunCompletion, RunId, RunRecord, RunStatus};

use super::{Document, DocumentStore, RepositoryError, RunLogRepository};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let documents = self.documents.read().await;
        Ok(documents.get(&(collection.to_string(), id.to_string())).cloned())
    }

    async fn put_document(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<(), RepositoryError> {
        let mut documents = self.documents.write().await;
        documents.insert((collection.to_string(), document.id.clone()), document);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryRunLogRepository {
    runs: RwLock<Vec<RunRecord>>,
}

impl InMemoryRunLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn running_record<'a>(
    runs: &'a mut [RunRecord],
    run_id: &RunId,
) -> Result<&'a mut RunRecord, RepositoryError> {
    let record = runs
        .iter_mut()
        .find(|record| &record.run_id == run_id)
        .ok_or_else(|| RepositoryError::NotFound(run_id.clone()))?;
    if record.status.is_terminal() {
        return Err(RepositoryError::AlreadyCompleted(run_id.clone()));
    }
    Ok(record)
}

#[async_trait::async_trait]
impl RunLogRepository for InMemoryRunLogRepository {
    async fn log_run_start(&self, run: NewRun) -> Result<RunId, RepositoryError> {
        let run_id = RunId::generate();
        let mut runs = self.runs.write().await;
        runs.push(run.into_record(run_id.clone(), Utc::now()));
        Ok(run_id)
    }

    async fn log_run_action(&self, run_id: &RunId, action: Action) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        running_record(&mut runs, run_id)?.actions.push(action);
        Ok(())
    }

    async fn log_run_complete(
        &self,
        run_id: &RunId,
        completion: RunCompletion,
    ) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        running_record(&mut runs, run_id)?.apply_completion(completion, Utc::now());
        Ok(())
    }

    async fn get_run_history(
        &self,
        customer_id: &CustomerId,
        limit: u32,
        include_dry_runs: bool,
    ) -> Result<Vec<RunRecord>, RepositoryError> {
        let runs = self.runs.read().await;
        let mut matching: Vec<RunRecord> = runs
            .iter()
            .filter(|record| &record.customer_id == customer_id)
            .filter(|record| include_dry_runs || !record.dry_run)
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.started_at.cmp(&left.started_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<RunRecord>, RepositoryError> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|record| &record.run_id == run_id).cloned())
    }
}

impl InMemoryRunLogRepository {
    /// Records currently stored, oldest first.
    pub async fn snapshot(&self) -> Vec<RunRecord> {
        self.runs.read().await.clone()
    }

    pub async fn count_with_status(&self, status: RunStatus) -> usize {
        self.runs.read().await.iter().filter(|record| record.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use adpilot_core::domain::campaign::CustomerId;
    use adpilot_core::domain::run::{NewRun, RunCompletion, RunStatus, Usecase};

    use crate::repositories::{
        Document, DocumentStore, InMemoryDocumentStore, InMemoryRunLogRepository,
        RepositoryError, RunLogRepository,
    };

    #[tokio::test]
    async fn in_memory_document_store_round_trip() {
        let store = InMemoryDocumentStore::new();
        let document = Document::new("42", json!({"campaigns": [{"campaignId": "7"}]}));

        store.put_document("GoogleAdsConfig", document.clone()).await.expect("put document");

        let found = store.get_document("GoogleAdsConfig", "42").await.expect("get document");
        assert_eq!(found, Some(document));
        assert!(store.get_document("SA360Config", "42").await.expect("get document").is_none());
    }

    #[tokio::test]
    async fn in_memory_run_log_completes_exactly_once() {
        let repo = InMemoryRunLogRepository::new();
        let run_id = repo
            .log_run_start(NewRun {
                customer_id: CustomerId::new("42"),
                usecase: Usecase::Sa360,
                dry_run: false,
                triggered_by: "manual".to_string(),
            })
            .await
            .expect("start run");

        let completion = RunCompletion {
            status: RunStatus::Error,
            summary: None,
            error: Some("config fetch failed".to_string()),
            actions: Vec::new(),
        };
        repo.log_run_complete(&run_id, completion.clone()).await.expect("complete run");

        let again = repo.log_run_complete(&run_id, completion).await;
        assert!(matches!(again, Err(RepositoryError::AlreadyCompleted(_))));
        assert_eq!(repo.count_with_status(RunStatus::Error).await, 1);

        let history =
            repo.get_run_history(&CustomerId::new("42"), 20, false).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].error.as_deref(), Some("config fetch failed"));
    }
}
