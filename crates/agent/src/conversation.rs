//! Tool-calling conversation with the model.
//!
//! The model answers every turn with a single JSON directive: either
//! `{"tool": "<name>", "args": {...}}` to call a tool, or
//! `{"final": "<summary>"}` to finish. A reply that is not a directive is
//! taken as the final answer.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{LlmClient, Message, Prompt};
use crate::tools::ToolRegistry;

#[derive(Clone, Debug, PartialEq)]
pub enum AgentDirective {
    CallTool { name: String, args: Value },
    Final(String),
}

impl AgentDirective {
    pub fn parse(reply: &str) -> Self {
        let trimmed = strip_fence(reply.trim());
        let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => return Self::Final(reply.trim().to_string()),
        };

        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => {
                if let Some(name) = value.get("tool").and_then(Value::as_str) {
                    let args = value.get("args").cloned().unwrap_or_else(|| json!({}));
                    Self::CallTool { name: name.to_string(), args }
                } else if let Some(text) = value.get("final") {
                    Self::Final(match text {
                        Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                } else {
                    Self::Final(reply.trim().to_string())
                }
            }
            Err(_) => Self::Final(reply.trim().to_string()),
        }
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Everything one campaign invocation needs.
pub struct AgentSession {
    pub instruction: String,
    pub request: String,
    pub tools: ToolRegistry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolStep {
    pub tool: String,
    pub args: Value,
    pub output: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentTranscript {
    pub steps: Vec<ToolStep>,
    pub summary: String,
}

#[async_trait]
pub trait CampaignAgent: Send + Sync {
    async fn run(&self, session: AgentSession) -> Result<AgentTranscript>;
}

const PROTOCOL: &str = "Reply with exactly one JSON object and nothing else. \
To call a tool: {\"tool\": \"<name>\", \"args\": {...}}. \
When you are done: {\"final\": \"<concise summary of your analysis and actions>\"}.";

pub struct ToolCallingAgent<C: ?Sized> {
    llm: Arc<C>,
    max_steps: u32,
}

impl<C> ToolCallingAgent<C>
where
    C: LlmClient + ?Sized + 'static,
{
    pub fn new(llm: Arc<C>, max_steps: u32) -> Self {
        Self { llm, max_steps: max_steps.max(1) }
    }

    fn system_prompt(session: &AgentSession) -> String {
        format!(
            "{}\n\n**Tools:**\n{}\n\n{PROTOCOL}",
            session.instruction.trim_end(),
            session.tools.describe()
        )
    }
}

#[async_trait]
impl<C> CampaignAgent for ToolCallingAgent<C>
where
    C: LlmClient + ?Sized + 'static,
{
    async fn run(&self, session: AgentSession) -> Result<AgentTranscript> {
        let mut prompt = Prompt {
            system: Self::system_prompt(&session),
            messages: vec![Message::user(session.request.clone())],
        };
        let mut transcript = AgentTranscript::default();

        for step in 0..self.max_steps {
            let reply = self.llm.complete(&prompt).await?;
            prompt.messages.push(Message::model(reply.clone()));

            match AgentDirective::parse(&reply) {
                AgentDirective::Final(summary) => {
                    transcript.summary = summary;
                    return Ok(transcript);
                }
                AgentDirective::CallTool { name, args } => {
                    let output = match session.tools.call(&name, args.clone()).await {
                        Ok(output) => output,
                        Err(error) => json!({ "success": false, "error": error.to_string() }),
                    };

                    tracing::debug!(
                        event_name = "agent.tool.called",
                        step,
                        tool = %name,
                        success = output.get("success").and_then(serde_json::Value::as_bool).unwrap_or(true),
                        "tool call finished"
                    );

                    prompt
                        .messages
                        .push(Message::user(json!({ "tool": name, "result": output }).to_string()));
                    transcript.steps.push(ToolStep { tool: name, args, output });
                }
            }
        }

        bail!("agent did not reach a final answer within {} steps", self.max_steps)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{AgentDirective, AgentSession, CampaignAgent, ToolCallingAgent};
    use crate::llm::{Role, ScriptedLlmClient};
    use crate::tools::{Tool, ToolRegistry};

    struct Weather;

    #[async_trait]
    impl Tool for Weather {
        fn name(&self) -> &'static str {
            "weather"
        }

        fn description(&self) -> &'static str {
            "Current weather."
        }

        fn parameters(&self) -> Value {
            json!({})
        }

        async fn execute(&self, _input: Value) -> Result<Value> {
            Ok(json!({ "success": true, "rain": true }))
        }
    }

    fn session() -> AgentSession {
        let mut tools = ToolRegistry::default();
        tools.register(Weather);
        AgentSession {
            instruction: "You manage campaign 7.".to_string(),
            request: "Proceed.".to_string(),
            tools,
        }
    }

    #[test]
    fn directives_parse_from_fenced_and_bare_replies() {
        let fenced = "```json\n{\"tool\": \"weather\", \"args\": {\"city\": \"Oslo\"}}\n```";
        assert_eq!(
            AgentDirective::parse(fenced),
            AgentDirective::CallTool { name: "weather".to_string(), args: json!({"city": "Oslo"}) }
        );
        assert_eq!(
            AgentDirective::parse("{\"tool\": \"weather\"}"),
            AgentDirective::CallTool { name: "weather".to_string(), args: json!({}) }
        );
        assert_eq!(
            AgentDirective::parse("{\"final\": \"paused campaign 7\"}"),
            AgentDirective::Final("paused campaign 7".to_string())
        );
        assert_eq!(
            AgentDirective::parse("No action needed today."),
            AgentDirective::Final("No action needed today.".to_string())
        );
    }

    #[tokio::test]
    async fn tool_results_and_errors_are_fed_back() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "{\"tool\": \"weather\"}",
            "{\"tool\": \"missing_tool\", \"args\": {}}",
            "{\"final\": \"It rains; no change.\"}",
        ]));
        let agent = ToolCallingAgent::new(llm.clone(), 5);

        let transcript = agent.run(session()).await.expect("agent finishes");

        assert_eq!(transcript.summary, "It rains; no change.");
        assert_eq!(transcript.steps.len(), 2);
        assert_eq!(transcript.steps[0].output["rain"], true);
        assert_eq!(transcript.steps[1].output["success"], false);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].system.contains("You manage campaign 7."));
        assert!(prompts[0].system.contains("\"weather\""));
        let last = &prompts[2].messages;
        assert_eq!(last.len(), 5);
        assert_eq!(last[4].role, Role::User);
        assert!(last[4].text.contains("unknown tool `missing_tool`"));
    }

    #[tokio::test]
    async fn step_budget_is_enforced() {
        let llm = Arc::new(ScriptedLlmClient::new(vec!["{\"tool\": \"weather\"}"; 3]));
        let agent = ToolCallingAgent::new(llm, 2);

        let error = agent.run(session()).await.expect_err("never finishes");
        assert_eq!(error.to_string(), "agent did not reach a final answer within 2 steps");
    }
}
