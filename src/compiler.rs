//! Compiles an [`Agent`] into a Kestra workflow definition.
//!
//! Compilation is pure and deterministic: the same agent always produces
//! byte-identical YAML. Provider credentials are never baked into the
//! definition; generated commands reference engine-resolved secrets
//! (`{{ secret('...') }}`), so rotating a key never requires recompiling
//! agents. Deployment is an upsert keyed by the workflow identity, so create
//! and update are the same call.

use std::sync::Arc;

use crate::kestra::{KestraClient, KestraError};
use crate::types::{Agent, ToolConfig, Trigger, TriggerType};

/// Namespace every compiled agent workflow lives in.
pub const NAMESPACE: &str = "agents";

/// Flow id for an agent: `agent-{id}`.
pub fn flow_id(agent_id: &str) -> String {
    format!("agent-{}", agent_id)
}

/// Fully-qualified workflow id: `agents.agent-{id}`.
pub fn workflow_id(agent_id: &str) -> String {
    format!("{}.{}", NAMESPACE, flow_id(agent_id))
}

/// A compiled (but not necessarily deployed) workflow definition.
#[derive(Debug, Clone)]
pub struct WorkflowSource {
    pub namespace: String,
    pub flow_id: String,
    pub yaml: String,
}

/// A workflow registered with the engine.
#[derive(Debug, Clone)]
pub struct DeployedWorkflow {
    /// `namespace.flowId` handle callers store on the agent record.
    pub workflow_id: String,
    pub source: WorkflowSource,
}

/// Translates agent records into workflow definitions and registers them.
pub struct AgentWorkflowCompiler {
    runtime: Arc<KestraClient>,
}

impl AgentWorkflowCompiler {
    pub fn new(runtime: Arc<KestraClient>) -> Self {
        Self { runtime }
    }

    /// Generate the workflow definition for an agent. Pure; no I/O.
    pub fn compile(&self, agent: &Agent) -> WorkflowSource {
        WorkflowSource {
            namespace: NAMESPACE.to_string(),
            flow_id: flow_id(&agent.id),
            yaml: generate_workflow_yaml(agent),
        }
    }

    /// Compile and register the workflow. The engine upserts on
    /// `(namespace, flow_id)`, so repeated deploys update in place and never
    /// create a duplicate identity.
    pub async fn deploy(&self, agent: &Agent) -> Result<DeployedWorkflow, KestraError> {
        let source = self.compile(agent);

        self.runtime
            .upsert_flow(&source.namespace, &source.flow_id, &source.yaml)
            .await?;

        Ok(DeployedWorkflow {
            workflow_id: workflow_id(&agent.id),
            source,
        })
    }

    /// Remove the agent's workflow identity from the engine.
    pub async fn delete(&self, agent_id: &str) -> Result<(), KestraError> {
        self.runtime.delete_flow(NAMESPACE, &flow_id(agent_id)).await
    }
}

/// Render the full workflow YAML for an agent.
pub fn generate_workflow_yaml(agent: &Agent) -> String {
    let description = agent.description.as_deref().unwrap_or(&agent.name);
    let triggers = generate_triggers_yaml(agent);
    let tasks = generate_tasks_yaml(agent);

    let mut yaml = format!(
        "id: {}\nnamespace: {}\ndescription: {}\n\n",
        flow_id(&agent.id),
        NAMESPACE,
        description
    );

    yaml.push_str(
        "inputs:\n\
         \x20 - id: user_input\n\
         \x20   type: STRING\n\
         \x20   required: false\n\
         \x20   defaults: \"\"\n\
         \x20 - id: context\n\
         \x20   type: JSON\n\
         \x20   required: false\n\n",
    );

    if !triggers.is_empty() {
        yaml.push_str(&format!("triggers:\n{}\n\n", triggers));
    }

    yaml.push_str(&format!("tasks:\n{}", tasks));
    yaml
}

/// One trigger primitive per enabled CHAT / WEBHOOK / SCHEDULE trigger.
/// EMAIL and A2A have no engine-side primitive yet and are skipped.
fn generate_triggers_yaml(agent: &Agent) -> String {
    agent
        .triggers
        .iter()
        .filter_map(|trigger| map_trigger(agent, trigger))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn map_trigger(agent: &Agent, trigger: &Trigger) -> Option<String> {
    if !trigger.enabled {
        tracing::debug!(trigger_id = %trigger.id, "skipping disabled trigger");
        return None;
    }

    match trigger.trigger_type {
        TriggerType::Webhook => Some(format!(
            "  - id: webhook-trigger\n    type: io.kestra.plugin.core.trigger.Webhook\n    key: {}",
            agent.id
        )),
        TriggerType::Schedule => {
            let cron = trigger.config.cron.as_deref().unwrap_or("0 0 * * *");
            Some(format!(
                "  - id: schedule-trigger\n    type: io.kestra.plugin.core.trigger.Schedule\n    cron: \"{}\"",
                cron
            ))
        }
        TriggerType::Chat => Some(format!(
            "  - id: chat-trigger\n    type: io.kestra.plugin.core.trigger.Webhook\n    key: {}-chat",
            agent.id
        )),
        TriggerType::Email | TriggerType::A2a => {
            tracing::warn!(
                trigger_id = %trigger.id,
                trigger_type = ?trigger.trigger_type,
                "trigger type has no workflow primitive; skipping"
            );
            None
        }
    }
}

/// The fixed 3-stage pipeline: parse-input, execute-tools, synthesize-results.
fn generate_tasks_yaml(agent: &Agent) -> String {
    // JSON-quote the instructions so multi-line prompts stay a single value
    // inside the generated request body.
    let instructions = serde_json::to_string(&agent.instructions)
        .unwrap_or_else(|_| "\"\"".to_string());

    let tool_tasks = generate_tool_tasks_yaml(&agent.tools);

    format!(
        r#"  # Step 1: Parse user input with LLM
  - id: parse-input
    type: io.kestra.plugin.scripts.shell.Commands
    description: Analyze user input and create execution plan
    commands:
      - |
        cat > request.json << 'EOF'
        {{
          "model": "{model}",
          "messages": [
            {{
              "role": "system",
              "content": {instructions}
            }},
            {{
              "role": "user",
              "content": "{{{{ inputs.user_input }}}}"
            }}
          ],
          "temperature": 0.3
        }}
        EOF
      - |
        curl -X POST https://openrouter.ai/api/v1/chat/completions \
          -H "Authorization: Bearer {{{{ secret('OPENROUTER_API_KEY') }}}}" \
          -H "Content-Type: application/json" \
          -d @request.json \
          > llm_response.json
      - cat llm_response.json
    outputs:
      llm_response: "{{{{ read('llm_response.json') }}}}"

  # Step 2: Execute tools based on LLM decision
  - id: execute-tools
    type: io.kestra.plugin.core.flow.Sequential
    description: Execute required tools in sequence
    tasks:
{tool_tasks}

  # Step 3: Synthesize results
  - id: synthesize-results
    type: io.kestra.plugin.scripts.shell.Commands
    description: Combine tool results into final response
    commands:
      - |
        cat > synthesis_request.json << 'EOF'
        {{
          "model": "{model}",
          "messages": [
            {{
              "role": "system",
              "content": "Synthesize the following tool execution results into a clear, actionable response."
            }},
            {{
              "role": "user",
              "content": "Results: {{{{ outputs['execute-tools'] }}}}"
            }}
          ]
        }}
        EOF
      - |
        curl -X POST https://openrouter.ai/api/v1/chat/completions \
          -H "Authorization: Bearer {{{{ secret('OPENROUTER_API_KEY') }}}}" \
          -H "Content-Type: application/json" \
          -d @synthesis_request.json \
          > final_response.json
      - cat final_response.json
    outputs:
      final_response: "{{{{ read('final_response.json') }}}}"
"#,
        model = agent.model,
        instructions = instructions,
        tool_tasks = tool_tasks,
    )
}

/// One stub sub-task per configured tool, in list order. Parameter binding to
/// individual tools happens at execution time; the stub records the tool id
/// and echoes the full input bag.
fn generate_tool_tasks_yaml(tools: &[ToolConfig]) -> String {
    if tools.is_empty() {
        return "      - id: no-tools\n\
                \x20       type: io.kestra.plugin.scripts.shell.Commands\n\
                \x20       commands:\n\
                \x20         - echo \"No tools configured\""
            .to_string();
    }

    tools
        .iter()
        .enumerate()
        .map(|(index, tool)| {
            format!(
                "      - id: tool-{n}-{tool_id}\n\
                 \x20       type: io.kestra.plugin.scripts.shell.Commands\n\
                 \x20       description: Execute {tool_id}\n\
                 \x20       commands:\n\
                 \x20         - 'echo \"Executing tool: {tool_id}\"'\n\
                 \x20         - 'echo \"Parameters: {{{{ toJson(inputs) }}}}\"'",
                n = index + 1,
                tool_id = tool.tool_id,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
