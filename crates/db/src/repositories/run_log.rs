use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use adpilot_core::actions::Action;
use adpilot_core::domain::campaign::CustomerId;
use adpilot_core::domain::run::{NewRun, RunCompletion, RunId, RunRecord, RunStatus, Usecase};

use super::{RepositoryError, RunLogRepository};
use crate::DbPool;

const RUN_COLUMNS: &str = "id,
    customer_id,
    usecase,
    dry_run,
    triggered_by,
    status,
    started_at,
    completed_at,
    actions_json,
    summary,
    error";

pub struct SqlRunLogRepository {
    pool: DbPool,
}

impl SqlRunLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Explains why a conditional update on a running row touched nothing.
    async fn missing_running_row(&self, run_id: &RunId) -> RepositoryError {
        let status = sqlx::query("SELECT status FROM agent_run WHERE id = ?")
            .bind(&run_id.0)
            .fetch_optional(&self.pool)
            .await;

        match status {
            Ok(Some(_)) => RepositoryError::AlreadyCompleted(run_id.clone()),
            Ok(None) => RepositoryError::NotFound(run_id.clone()),
            Err(error) => RepositoryError::Database(error),
        }
    }
}

#[async_trait::async_trait]
impl RunLogRepository for SqlRunLogRepository {
    async fn log_run_start(&self, run: NewRun) -> Result<RunId, RepositoryError> {
        let run_id = RunId::generate();
        let started_at = Utc::now();

        sqlx::query(
            "INSERT INTO agent_run (
                id,
                customer_id,
                usecase,
                dry_run,
                triggered_by,
                status,
                started_at,
                actions_json
             ) VALUES (?, ?, ?, ?, ?, ?, ?, '[]')",
        )
        .bind(&run_id.0)
        .bind(run.customer_id.as_str())
        .bind(run.usecase.as_str())
        .bind(run.dry_run)
        .bind(&run.triggered_by)
        .bind(RunStatus::Running.as_str())
        .bind(format_timestamp(started_at))
        .execute(&self.pool)
        .await?;

        tracing::info!(
            event_name = "run_log.started",
            run_id = %run_id,
            customer_id = %run.customer_id,
            usecase = run.usecase.as_str(),
            dry_run = run.dry_run,
            "agent run started"
        );

        Ok(run_id)
    }

    async fn log_run_action(&self, run_id: &RunId, action: Action) -> Result<(), RepositoryError> {
        let action_json = serde_json::to_string(&action)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let result = sqlx::query(
            "UPDATE agent_run
             SET actions_json = json_insert(actions_json, '$[#]', json(?))
             WHERE id = ? AND status = 'running'",
        )
        .bind(action_json)
        .bind(&run_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_running_row(run_id).await);
        }

        Ok(())
    }

    async fn log_run_complete(
        &self,
        run_id: &RunId,
        completion: RunCompletion,
    ) -> Result<(), RepositoryError> {
        let actions_json = serde_json::to_string(&completion.actions)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let result = sqlx::query(
            "UPDATE agent_run
             SET status = ?,
                 completed_at = ?,
                 actions_json = ?,
                 summary = ?,
                 error = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(completion.status.as_str())
        .bind(format_timestamp(Utc::now()))
        .bind(actions_json)
        .bind(completion.summary.as_deref())
        .bind(completion.error.as_deref())
        .bind(&run_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_running_row(run_id).await);
        }

        tracing::info!(
            event_name = "run_log.completed",
            run_id = %run_id,
            status = completion.status.as_str(),
            action_count = completion.actions.len(),
            "agent run completed"
        );

        Ok(())
    }

    async fn get_run_history(
        &self,
        customer_id: &CustomerId,
        limit: u32,
        include_dry_runs: bool,
    ) -> Result<Vec<RunRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS}
             FROM agent_run
             WHERE customer_id = ? AND (? OR dry_run = 0)
             ORDER BY started_at DESC
             LIMIT ?"
        ))
        .bind(customer_id.as_str())
        .bind(include_dry_runs)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(run_from_row).collect()
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<RunRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RUN_COLUMNS} FROM agent_run WHERE id = ?"))
            .bind(&run_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(run_from_row).transpose()
    }
}

fn run_from_row(row: SqliteRow) -> Result<RunRecord, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = RunStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown run status `{status_raw}`")))?;

    let usecase = row
        .try_get::<String, _>("usecase")?
        .parse::<Usecase>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let actions_raw = row.try_get::<String, _>("actions_json")?;
    let actions = serde_json::from_str::<Vec<Action>>(&actions_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid actions_json payload ({error})"))
    })?;

    Ok(RunRecord {
        run_id: RunId(row.try_get("id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        usecase,
        dry_run: row.try_get::<bool, _>("dry_run")?,
        triggered_by: row.try_get("triggered_by")?,
        status,
        started_at: parse_timestamp("started_at", row.try_get("started_at")?)?,
        completed_at: row
            .try_get::<Option<String>, _>("completed_at")?
            .map(|value| parse_timestamp("completed_at", value))
            .transpose()?,
        actions,
        summary: row.try_get("summary")?,
        error: row.try_get("error")?,
    })
}

// Fixed-width UTC timestamps so lexical order matches chronological order.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
