//! Per-customer decision loop.
//!
//! One run covers every configured campaign of one customer, processed
//! sequentially. The live/dry-run choice is made once per run and fixes the
//! executor behind every tool call.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use adpilot_ads::{AdsBackend, CampaignUpdater, DryRunExecutor, LiveExecutor, MutationExecutor};
use adpilot_core::actions::{Action, ActionJournal, RunActionLog};
use adpilot_core::domain::campaign::CustomerId;
use adpilot_core::domain::run::{NewRun, RunCompletion, RunId, RunStatus, Usecase};
use adpilot_core::errors::ApplicationError;
use adpilot_db::repositories::{DocumentStore, RunLogRepository};

use crate::conversation::{AgentSession, CampaignAgent};
use crate::prompt::{
    campaign_request, render_campaign_instruction, CampaignBrief, DEFAULT_CAMPAIGN_INSTRUCTION,
};
use crate::signals::{register_context_tools, ExternalApiTool};
use crate::toolset::google_ads_toolset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub customer_id: CustomerId,
    pub usecase: Usecase,
    pub dry_run: bool,
    pub triggered_by: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    pub actions: Vec<Action>,
    pub dry_run: bool,
    pub campaigns_processed: u32,
    pub campaigns_failed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CampaignEntry {
    campaign_id: String,
    instruction: String,
}

fn campaign_entries(config: &Value) -> Vec<CampaignEntry> {
    let Some(campaigns) = config.get("campaigns").and_then(Value::as_array) else {
        return Vec::new();
    };

    campaigns
        .iter()
        .filter_map(|campaign| {
            let campaign_id = match campaign.get("campaignId") {
                Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
                Some(Value::Number(id)) => id.to_string(),
                _ => {
                    tracing::warn!(
                        event_name = "agent.campaign.skipped",
                        "skipping campaign entry with missing campaignId"
                    );
                    return None;
                }
            };
            let instruction = campaign
                .get("instruction")
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty())
                .unwrap_or(DEFAULT_CAMPAIGN_INSTRUCTION)
                .to_string();
            Some(CampaignEntry { campaign_id, instruction })
        })
        .collect()
}

struct Tally {
    processed: u32,
    failed: u32,
}

pub struct DecisionRuntime {
    documents: Arc<dyn DocumentStore>,
    runs: Arc<dyn RunLogRepository>,
    backend: Arc<dyn AdsBackend>,
    agent: Arc<dyn CampaignAgent>,
    journal: ActionJournal,
    instructions_collection: String,
    external_apis: Option<ExternalApiTool>,
}

impl DecisionRuntime {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        runs: Arc<dyn RunLogRepository>,
        backend: Arc<dyn AdsBackend>,
        agent: Arc<dyn CampaignAgent>,
    ) -> Self {
        Self {
            documents,
            runs,
            backend,
            agent,
            journal: ActionJournal::new(),
            instructions_collection: "CustomerInstructions".to_string(),
            external_apis: None,
        }
    }

    pub fn with_instructions_collection(mut self, collection: impl Into<String>) -> Self {
        self.instructions_collection = collection.into();
        self
    }

    pub fn with_journal(mut self, journal: ActionJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_external_apis(mut self, external_apis: ExternalApiTool) -> Self {
        self.external_apis = Some(external_apis);
        self
    }

    pub async fn run_decision_agent(&self, request: RunRequest) -> RunOutcome {
        let RunRequest { customer_id, usecase, dry_run, triggered_by } = request;

        let run_id = match self
            .runs
            .log_run_start(NewRun {
                customer_id: customer_id.clone(),
                usecase,
                dry_run,
                triggered_by: triggered_by.clone(),
            })
            .await
        {
            Ok(run_id) => run_id,
            Err(error) => {
                let run_id = RunId::temporary(Utc::now());
                tracing::warn!(
                    event_name = "agent.run.start_not_recorded",
                    customer_id = %customer_id,
                    run_id = %run_id,
                    error = %error,
                    "could not record run start; continuing with a temporary id"
                );
                run_id
            }
        };

        tracing::info!(
            event_name = "agent.run.started",
            run_id = %run_id,
            customer_id = %customer_id,
            usecase = %usecase,
            dry_run,
            triggered_by = %triggered_by,
            "decision run started"
        );

        let actions = self.journal.scope(run_id.clone());
        actions.clear();

        let (status, tally, summary, error) =
            match self.process(&customer_id, usecase, dry_run, &run_id, &actions).await {
                Ok((status, tally, summary)) => (status, tally, Some(summary), None),
                Err(error) => {
                    tracing::error!(
                        event_name = "agent.run.failed",
                        run_id = %run_id,
                        customer_id = %customer_id,
                        error_class = error.error_class(),
                        error = %error,
                        "decision run failed"
                    );
                    let tally = Tally { processed: 0, failed: 0 };
                    (RunStatus::Error, tally, None, Some(error.to_string()))
                }
            };

        let recorded = actions.get_all();
        self.complete(&run_id, status, summary.clone(), error.clone(), recorded.clone()).await;
        self.journal.release(&run_id);

        tracing::info!(
            event_name = "agent.run.completed",
            run_id = %run_id,
            customer_id = %customer_id,
            status = %status,
            actions = recorded.len(),
            campaigns_processed = tally.processed,
            campaigns_failed = tally.failed,
            "decision run completed"
        );

        RunOutcome {
            run_id,
            status,
            actions: recorded,
            dry_run,
            campaigns_processed: tally.processed,
            campaigns_failed: tally.failed,
            summary,
            error,
        }
    }

    async fn process(
        &self,
        customer_id: &CustomerId,
        usecase: Usecase,
        dry_run: bool,
        run_id: &RunId,
        actions: &RunActionLog,
    ) -> Result<(RunStatus, Tally, String), ApplicationError> {
        let instructions = self
            .documents
            .get_document(&self.instructions_collection, customer_id.as_str())
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        let global_instruction = instructions
            .as_ref()
            .and_then(|document| document.field("instruction"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        if global_instruction.is_empty() {
            tracing::warn!(
                event_name = "agent.run.no_instructions",
                customer_id = %customer_id,
                "no global instructions; cancelling run"
            );
            return Ok((
                RunStatus::Cancelled,
                Tally { processed: 0, failed: 0 },
                format!("No global instructions found for customer {customer_id}."),
            ));
        }

        let config = self
            .documents
            .get_document(usecase.config_collection(), customer_id.as_str())
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        let campaigns = config.map(|document| campaign_entries(&document.data)).unwrap_or_default();

        if campaigns.is_empty() {
            tracing::info!(
                event_name = "agent.run.no_campaigns",
                customer_id = %customer_id,
                collection = usecase.config_collection(),
                "no campaigns configured"
            );
            return Ok((
                RunStatus::Success,
                Tally { processed: 0, failed: 0 },
                format!("No campaigns configured for customer {customer_id}."),
            ));
        }

        let executor: Arc<dyn MutationExecutor> = if dry_run {
            Arc::new(DryRunExecutor::new(actions.clone()))
        } else {
            Arc::new(LiveExecutor::new(Arc::clone(&self.backend), actions.clone()))
        };
        let updater = Arc::new(CampaignUpdater::new(Arc::clone(&self.backend), executor));

        let mut tally = Tally { processed: 0, failed: 0 };
        let mut persisted = 0;
        for campaign in &campaigns {
            match self.run_campaign(customer_id, &global_instruction, campaign, &updater).await {
                Ok(summary) => {
                    tally.processed += 1;
                    tracing::info!(
                        event_name = "agent.campaign.completed",
                        run_id = %run_id,
                        campaign_id = %campaign.campaign_id,
                        summary = %summary,
                        "campaign processed"
                    );
                }
                Err(error) => {
                    tally.failed += 1;
                    tracing::error!(
                        event_name = "agent.campaign.failed",
                        run_id = %run_id,
                        campaign_id = %campaign.campaign_id,
                        error = %error,
                        "campaign processing failed; continuing"
                    );
                }
            }
            persisted = self.persist_new_actions(run_id, actions, persisted).await;
        }

        let summary = format!(
            "Processed {} of {} campaigns ({} failed); {} actions recorded.",
            tally.processed,
            campaigns.len(),
            tally.failed,
            actions.len()
        );
        Ok((RunStatus::Success, tally, summary))
    }

    async fn run_campaign(
        &self,
        customer_id: &CustomerId,
        global_instruction: &str,
        campaign: &CampaignEntry,
        updater: &Arc<CampaignUpdater>,
    ) -> anyhow::Result<String> {
        let instruction = render_campaign_instruction(&CampaignBrief {
            customer_id: customer_id.as_str(),
            global_instruction,
            campaign_id: &campaign.campaign_id,
            campaign_instruction: &campaign.instruction,
        })?;

        let mut tools = google_ads_toolset(customer_id, Arc::clone(updater));
        register_context_tools(&mut tools, &self.documents, self.external_apis.as_ref());

        let session = AgentSession {
            instruction,
            request: campaign_request(&campaign.campaign_id),
            tools,
        };

        let transcript = self.agent.run(session).await?;
        Ok(transcript.summary)
    }

    /// Appends actions logged since `from` to the stored run; returns the new
    /// high-water mark.
    async fn persist_new_actions(
        &self,
        run_id: &RunId,
        actions: &RunActionLog,
        from: usize,
    ) -> usize {
        if run_id.is_temporary() {
            return from;
        }
        let all = actions.get_all();
        for action in all.iter().skip(from) {
            if let Err(error) = self.runs.log_run_action(run_id, action.clone()).await {
                tracing::warn!(
                    event_name = "agent.run.action_not_recorded",
                    run_id = %run_id,
                    error = %error,
                    "could not append action to run record"
                );
            }
        }
        all.len()
    }

    async fn complete(
        &self,
        run_id: &RunId,
        status: RunStatus,
        summary: Option<String>,
        error: Option<String>,
        actions: Vec<Action>,
    ) {
        if run_id.is_temporary() {
            tracing::warn!(
                event_name = "agent.run.completion_skipped",
                run_id = %run_id,
                "run has a temporary id; completion not recorded"
            );
            return;
        }

        let completion = RunCompletion { status, summary, error, actions };
        if let Err(error) = self.runs.log_run_complete(run_id, completion).await {
            tracing::warn!(
                event_name = "agent.run.completion_not_recorded",
                run_id = %run_id,
                error = %error,
                "could not record run completion"
            );
        }
    }
}
