use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::run::RunId;

/// One mutating tool invocation, real or simulated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "tool")]
    pub tool_name: String,
    pub params: Value,
    pub description: String,
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

type RunLogs = HashMap<RunId, Vec<Action>>;

/// Process-wide action storage, partitioned by run id.
#[derive(Clone, Default)]
pub struct ActionJournal {
    runs: Arc<Mutex<RunLogs>>,
}

impl ActionJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self, run_id: RunId) -> RunActionLog {
        RunActionLog { run_id, journal: self.clone() }
    }

    /// Drops a finished run's entries, returning them.
    pub fn release(&self, run_id: &RunId) -> Vec<Action> {
        self.lock().remove(run_id).unwrap_or_default()
    }

    pub fn active_runs(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, RunLogs> {
        match self.runs.lock() {
            Ok(runs) => runs,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Handle onto the actions of a single run.
#[derive(Clone)]
pub struct RunActionLog {
    run_id: RunId,
    journal: ActionJournal,
}

impl RunActionLog {
    /// A log backed by its own journal, for callers outside a decision run.
    pub fn detached(run_id: RunId) -> Self {
        ActionJournal::new().scope(run_id)
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn log(
        &self,
        tool_name: impl Into<String>,
        params: Value,
        description: impl Into<String>,
        simulated: bool,
        result: Option<Value>,
    ) -> Action {
        let action = Action {
            timestamp: Utc::now(),
            tool_name: tool_name.into(),
            params,
            description: description.into(),
            simulated,
            result,
        };

        tracing::info!(
            event_name = "agent.action.logged",
            run_id = %self.run_id,
            tool = %action.tool_name,
            simulated,
            "{}",
            action.description
        );

        self.journal.lock().entry(self.run_id.clone()).or_default().push(action.clone());
        action
    }

    pub fn clear(&self) {
        self.journal.lock().insert(self.run_id.clone(), Vec::new());
    }

    pub fn get_all(&self) -> Vec<Action> {
        self.journal.lock().get(&self.run_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.journal.lock().get(&self.run_id).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::{ActionJournal, RunActionLog};
    use crate::domain::run::RunId;

    #[test]
    fn clear_then_log_returns_actions_in_call_order() {
        let log = RunActionLog::detached(RunId("run-a".to_owned()));
        log.log("seed_tool", json!({}), "stale entry", true, None);
        log.clear();

        for index in 0..5 {
            log.log("update_google_ads_campaign_status", json!({"i": index}), "step", true, None);
        }

        let actions = log.get_all();
        assert_eq!(actions.len(), 5);
        let order: Vec<i64> =
            actions.iter().filter_map(|action| action.params["i"].as_i64()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn runs_do_not_see_each_other() {
        let journal = ActionJournal::new();
        let first = journal.scope(RunId("run-1".to_owned()));
        let second = journal.scope(RunId("run-2".to_owned()));

        first.log("a", json!({}), "first", false, Some(json!({"success": true})));
        second.clear();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(journal.active_runs(), 2);

        let released = journal.release(first.run_id());
        assert_eq!(released.len(), 1);
        assert_eq!(journal.active_runs(), 1);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let journal = ActionJournal::new();
        let log = journal.scope(RunId("run-c".to_owned()));
        log.clear();

        thread::scope(|scope| {
            for worker in 0..4 {
                let log = log.clone();
                scope.spawn(move || {
                    for step in 0..25 {
                        log.log("tool", json!({"worker": worker, "step": step}), "x", true, None);
                    }
                });
            }
        });

        assert_eq!(log.get_all().len(), 100);
    }

    #[test]
    fn action_serializes_tool_name_as_tool() {
        let log = RunActionLog::detached(RunId("run-s".to_owned()));
        let action = log.log("update_google_ads_campaign_budget", json!({}), "d", true, None);
        let value = serde_json::to_value(&action).expect("action serializes");

        assert_eq!(value["tool"], "update_google_ads_campaign_budget");
        assert!(value.get("result").is_none());
    }
}
