//! Agent runtime: the per-customer decision loop that walks configured
//! campaigns and lets an LLM drive the Google Ads tools.
//!
//! # Architecture
//!
//! 1. **Prompting** (`prompt`) - render the campaign manager instruction
//! 2. **Tool calling** (`conversation`) - LLM loop over a `ToolRegistry`
//! 3. **Tools** (`toolset`) - Google Ads operations bound to one customer
//! 4. **Context** (`signals`) - stored documents and configured external APIs
//! 5. **Runs** (`runtime`) - run lifecycle, action journal and persistence
//!
//! Whether a run mutates the account is fixed when the run starts; tools
//! never decide it.

pub mod conversation;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod signals;
pub mod tools;
pub mod toolset;

pub use conversation::{
    AgentDirective, AgentSession, AgentTranscript, CampaignAgent, ToolCallingAgent,
};
pub use llm::{GeminiClient, LlmClient, LlmError, ScriptedLlmClient};
pub use runtime::{DecisionRuntime, RunOutcome, RunRequest};
pub use signals::{register_context_tools, DocumentTool, ExternalApiTool};
pub use tools::{Tool, ToolRegistry};
pub use toolset::{google_ads_toolset, AdsTool};
