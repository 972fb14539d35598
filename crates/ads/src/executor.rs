//! Live and simulated application of campaign mutations.
//!
//! Both executors share the same input, so the orchestrator in
//! [`crate::updater`] is identical for dry and live runs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use adpilot_core::actions::RunActionLog;
use adpilot_core::domain::campaign::CustomerId;

use crate::backend::{AdsBackend, MutateOperation};
use crate::errors::UpdateError;

/// A fully validated mutation, ready to send or simulate.
#[derive(Clone, Debug)]
pub struct Mutation {
    /// Tool name recorded in the action log.
    pub tool: &'static str,
    /// Verb phrase used in failure messages, e.g. `update campaign status`.
    pub operation_name: &'static str,
    pub params: Value,
    pub description: String,
    /// Id echoed in the simulated resource name.
    pub target: String,
    pub operation: MutateOperation,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MutationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MutationResult {
    pub fn no_changes() -> Self {
        Self {
            success: true,
            dry_run: false,
            resource_name: None,
            resource_names: Vec::new(),
            message: Some("No changes to apply.".to_string()),
        }
    }
}

#[async_trait]
pub trait MutationExecutor: Send + Sync {
    fn is_dry_run(&self) -> bool;

    async fn apply(
        &self,
        customer_id: &CustomerId,
        mutation: Mutation,
    ) -> Result<MutationResult, UpdateError>;
}

pub struct LiveExecutor {
    backend: Arc<dyn AdsBackend>,
    actions: RunActionLog,
}

impl LiveExecutor {
    pub fn new(backend: Arc<dyn AdsBackend>, actions: RunActionLog) -> Self {
        Self { backend, actions }
    }
}

#[async_trait]
impl MutationExecutor for LiveExecutor {
    fn is_dry_run(&self) -> bool {
        false
    }

    async fn apply(
        &self,
        customer_id: &CustomerId,
        mutation: Mutation,
    ) -> Result<MutationResult, UpdateError> {
        let Mutation { tool, operation_name, params, description, operation, .. } = mutation;

        match self.backend.mutate(customer_id, &operation).await {
            Ok(response) => {
                let result = if operation.is_batch() {
                    MutationResult {
                        success: true,
                        dry_run: false,
                        resource_name: None,
                        resource_names: response.resource_names,
                        message: None,
                    }
                } else {
                    MutationResult {
                        success: true,
                        dry_run: false,
                        resource_name: response.resource_names.into_iter().next(),
                        resource_names: Vec::new(),
                        message: None,
                    }
                };
                let logged = serde_json::to_value(&result).ok();
                self.actions.log(tool, params, description, false, logged);
                Ok(result)
            }
            Err(error) => {
                let error = UpdateError::from_backend(operation_name, error);
                tracing::error!(
                    event_name = "ads.mutation.failed",
                    customer_id = %customer_id,
                    tool,
                    retryable = error.is_retryable(),
                    error = %error,
                    "campaign mutation failed"
                );
                self.actions.log(
                    tool,
                    params,
                    description,
                    false,
                    Some(serde_json::json!({ "success": false, "error": error.to_string() })),
                );
                Err(error)
            }
        }
    }
}

/// Records what would have been sent and reports success without calling
/// the backend.
pub struct DryRunExecutor {
    actions: RunActionLog,
}

impl DryRunExecutor {
    pub fn new(actions: RunActionLog) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl MutationExecutor for DryRunExecutor {
    fn is_dry_run(&self) -> bool {
        true
    }

    async fn apply(
        &self,
        _customer_id: &CustomerId,
        mutation: Mutation,
    ) -> Result<MutationResult, UpdateError> {
        let result = MutationResult {
            success: true,
            dry_run: true,
            resource_name: Some(format!("simulated/{}", mutation.target)),
            resource_names: Vec::new(),
            message: Some(format!("[DRY-RUN] {}", mutation.description)),
        };
        self.actions.log(
            mutation.tool,
            mutation.params,
            mutation.description,
            true,
            serde_json::to_value(&result).ok(),
        );
        Ok(result)
    }
}
