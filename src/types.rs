//! Core data model: agents, triggers, tools, and execution records.
//!
//! These types mirror the JSON shape the surrounding platform stores for
//! agents and tool catalogs, so serde renames follow the stored wire format
//! (`toolId`, `workingDirectory`, ...). The compiler and planning loop treat
//! an [`Agent`] as an immutable input.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative description of an autonomous agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identifier; also keys the compiled workflow identity.
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: AgentStatus,

    /// System prompt text sent verbatim to the model.
    pub instructions: String,

    /// Model identifier in provider format (e.g. `meta-llama/llama-3.1-405b-instruct`).
    pub model: String,

    #[serde(default)]
    pub triggers: Vec<Trigger>,

    /// Ordered tool bindings; list order is execution order within a cycle.
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    #[default]
    Active,
    Paused,
    Deleted,
}

/// Event source that starts an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,

    #[serde(rename = "type")]
    pub trigger_type: TriggerType,

    pub enabled: bool,

    #[serde(default)]
    pub config: TriggerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Chat,
    Webhook,
    Schedule,
    Email,
    A2a,
}

/// Per-trigger settings. Only the fields relevant to the trigger's type are
/// populated; the rest stay `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// CHAT: channels the agent listens on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<String>>,

    /// WEBHOOK: inbound URL and verb.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// SCHEDULE: cron expression and timezone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// EMAIL: mailbox and subject filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// A2A: upstream agent and firing condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Binding of a catalog tool to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub tool_id: String,

    pub enabled: bool,

    /// Default parameters supplied when the agent invokes this tool.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
}

/// A catalog entry describing an executable capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub description: String,

    #[serde(rename = "type")]
    pub kind: ToolKind,

    #[serde(default)]
    pub config: ToolExecutionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolKind {
    Api,
    Cli,
    Function,
    Database,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api => write!(f, "API"),
            Self::Cli => write!(f, "CLI"),
            Self::Function => write!(f, "FUNCTION"),
            Self::Database => write!(f, "DATABASE"),
        }
    }
}

/// Per-kind execution settings. A single struct covers all kinds; unused
/// fields are `None` for a given tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionConfig {
    // API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,

    // CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    /// Timeout in milliseconds; expiry kills the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    // FUNCTION (reserved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,

    // DATABASE (reserved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// Authentication scheme for API tools. Stored as `{type, credentials}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "credentials", rename_all = "camelCase")]
pub enum Authentication {
    Bearer {
        token: String,
    },
    ApiKey {
        /// Header name; defaults to `X-API-Key` when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
        key: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

/// Uniform envelope for one tool invocation. Always produced; failures are
/// captured here instead of propagating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,

    /// Synthetic display cost; not a billing figure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// A completed step inside one planning cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStep {
    pub tool_name: String,
    pub output: Value,
}

/// A step the plan still intends to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingStep {
    pub tool_name: String,
    pub parameters: Value,
}

/// Transient state the decision stage reasons over. Lives only for the
/// duration of one run; nothing here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub intent: String,
    pub completed_steps: Vec<CompletedStep>,
    pub remaining_steps: Vec<PendingStep>,
}

/// A single entry in a run's execution log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Record of one executed step, appended to the run report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: uuid::Uuid,
    pub tool_id: String,
    pub tool_name: String,
    pub result: ToolExecutionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_deserializes_from_stored_shape() {
        let raw = r#"{
            "id": "agent-1",
            "name": "PR reviewer",
            "instructions": "Review pull requests.",
            "model": "meta-llama/llama-3.1-405b-instruct",
            "triggers": [
                {"id": "t1", "type": "WEBHOOK", "enabled": true, "config": {}}
            ],
            "tools": [
                {"toolId": "github-api", "enabled": true, "parameters": {"repo": "x/y"}}
            ]
        }"#;

        let agent: Agent = serde_json::from_str(raw).unwrap();
        assert_eq!(agent.status, AgentStatus::Active);
        assert_eq!(agent.triggers[0].trigger_type, TriggerType::Webhook);
        assert_eq!(agent.tools[0].tool_id, "github-api");
    }

    #[test]
    fn authentication_round_trips_tagged_form() {
        let raw = r#"{"type": "apiKey", "credentials": {"key": "k123"}}"#;
        let auth: Authentication = serde_json::from_str(raw).unwrap();
        match auth {
            Authentication::ApiKey { header, ref key } => {
                assert!(header.is_none());
                assert_eq!(key, "k123");
            }
            _ => panic!("expected apiKey scheme"),
        }
    }

    #[test]
    fn tool_kind_uses_upper_case_wire_names() {
        assert_eq!(serde_json::to_string(&ToolKind::Api).unwrap(), "\"API\"");
        let kind: ToolKind = serde_json::from_str("\"DATABASE\"").unwrap();
        assert_eq!(kind, ToolKind::Database);
    }
}
