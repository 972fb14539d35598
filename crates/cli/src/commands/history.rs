use adpilot_core::domain::campaign::CustomerId;
use adpilot_db::repositories::DEFAULT_HISTORY_LIMIT;
use adpilot_db::{RunLogRepository, SqlRunLogRepository};
use clap::Args;

use crate::commands::{open_database, prepare, CommandResult};

#[derive(Debug, Clone, Args)]
pub struct HistoryArgs {
    #[arg(long, help = "Customer id, with or without dashes")]
    pub customer_id: String,
    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT, help = "Maximum number of runs to return")]
    pub limit: u32,
    #[arg(long, help = "Leave dry runs out of the listing")]
    pub exclude_dry_runs: bool,
}

pub fn run(args: HistoryArgs) -> CommandResult {
    let (config, runtime) = match prepare("history") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    let customer_id = CustomerId::new(&args.customer_id);

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let runs = SqlRunLogRepository::new(pool.clone());
        let history = runs
            .get_run_history(&customer_id, args.limit, !args.exclude_dry_runs)
            .await
            .map_err(|error| ("history_query", error.to_string(), 6u8));
        pool.close().await;
        history
    });

    match result {
        Ok(records) => match serde_json::to_value(&records) {
            Ok(data) => CommandResult::success_with_data(
                "history",
                format!("{} runs for customer {customer_id}", records.len()),
                Some(data),
            ),
            Err(error) => CommandResult::failure("history", "serialization", error.to_string(), 7),
        },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("history", error_class, message, exit_code)
        }
    }
}
