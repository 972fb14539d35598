use std::sync::Arc;

use adpilot_agent::{
    DecisionRuntime, ExternalApiTool, GeminiClient, RunOutcome, RunRequest, ToolCallingAgent,
};
use adpilot_ads::GoogleAdsRestClient;
use adpilot_core::config::AppConfig;
use adpilot_core::domain::campaign::CustomerId;
use adpilot_core::domain::run::{RunStatus, Usecase};
use adpilot_db::{SqlDocumentStore, SqlRunLogRepository};
use clap::Args;

use crate::commands::{init_logging, open_database, prepare, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[arg(long, help = "Customer id, with or without dashes")]
    pub customer_id: String,
    #[arg(long, default_value = "google_ads", help = "Campaign config to use: google_ads or sa360")]
    pub usecase: String,
    #[arg(long, help = "Simulate mutating tools and record them without calling Google Ads")]
    pub dry_run: bool,
    #[arg(long, default_value = "cli", help = "Label stored with the run record")]
    pub triggered_by: String,
}

pub fn run(args: RunArgs) -> CommandResult {
    let usecase = match args.usecase.parse::<Usecase>() {
        Ok(usecase) => usecase,
        Err(error) => {
            return CommandResult::failure("run", "invalid_argument", error.to_string(), 2)
        }
    };

    let (config, runtime) = match prepare("run") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    init_logging(&config);

    let request = RunRequest {
        customer_id: CustomerId::new(&args.customer_id),
        usecase,
        dry_run: args.dry_run,
        triggered_by: args.triggered_by,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let decision = build_runtime(&config, &pool)?;
        let outcome = decision.run_decision_agent(request).await;
        pool.close().await;
        Ok::<RunOutcome, (&'static str, String, u8)>(outcome)
    });

    match result {
        Ok(outcome) => render(outcome),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("run", error_class, message, exit_code)
        }
    }
}

fn build_runtime(
    config: &AppConfig,
    pool: &adpilot_db::DbPool,
) -> Result<DecisionRuntime, (&'static str, String, u8)> {
    let backend = GoogleAdsRestClient::new(&config.google_ads)
        .map_err(|error| ("integration_init", format!("google ads client: {error}"), 6u8))?;
    let llm = GeminiClient::from_config(&config.llm)
        .map_err(|error| ("integration_init", format!("llm client: {error}"), 6u8))?;
    let agent = ToolCallingAgent::new(Arc::new(llm), config.agent.max_steps);

    let runtime = DecisionRuntime::new(
        Arc::new(SqlDocumentStore::new(pool.clone())),
        Arc::new(SqlRunLogRepository::new(pool.clone())),
        Arc::new(backend),
        Arc::new(agent),
    )
    .with_instructions_collection(config.agent.instructions_collection.clone());

    if config.agent.external_apis.is_empty() {
        return Ok(runtime);
    }
    let external = ExternalApiTool::from_config(&config.agent.external_apis)
        .map_err(|error| ("integration_init", format!("external api client: {error}"), 6u8))?;
    Ok(runtime.with_external_apis(external))
}

fn render(outcome: RunOutcome) -> CommandResult {
    if outcome.status == RunStatus::Error {
        let message = outcome.error.unwrap_or_else(|| "decision run failed".to_string());
        return CommandResult::failure("run", "run_failed", message, 7);
    }

    let message = outcome
        .summary
        .clone()
        .unwrap_or_else(|| {
            format!("run {} finished with status {}", outcome.run_id, outcome.status)
        });
    match serde_json::to_value(&outcome) {
        Ok(data) => CommandResult::success_with_data("run", message, Some(data)),
        Err(error) => CommandResult::failure("run", "serialization", error.to_string(), 7),
    }
}
