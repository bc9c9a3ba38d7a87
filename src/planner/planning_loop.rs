//! The planning loop itself: four model-driven stages plus the driver that
//! chains them over sequential tool executions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llm::{model_cost, ChatMessage, ChatOptions, LlmClient, LlmError};
use crate::tools::ToolExecutionEngine;
use crate::types::{
    Agent, CompletedStep, ExecutionState, LogEntry, LogLevel, PendingStep, StepRecord, Tool,
    ToolExecutionResult,
};

use super::{parse_or, ModelOutput};

/// What the model believes the user wants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIntent {
    pub intent: String,
    pub reasoning: String,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

/// Ordered plan produced before execution starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub estimated_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub tool_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Verdict of the decision stage after one tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub should_continue: bool,
    #[serde(default)]
    pub next_action: Option<NextAction>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAction {
    pub tool_id: String,
    #[serde(default)]
    pub parameters: Value,
}

/// Final synthesized answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub summary: String,
    pub detailed_analysis: String,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
}

/// Input to the synthesis stage: one entry per executed tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutcome {
    pub tool_name: String,
    pub output: Value,
    pub success: bool,
}

/// A stage's typed result plus the estimated cost of its model call.
#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    pub result: ModelOutput<T>,
    pub cost: f64,
}

/// Everything a completed run produced.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub intent: ParsedIntent,
    pub plan: ExecutionPlan,
    pub steps: Vec<StepRecord>,
    pub synthesis: Synthesis,
    /// Tool executions performed before the loop stopped.
    pub iterations: usize,
    /// Estimated model spend across all stages.
    pub model_cost: f64,
    /// Summed synthetic tool costs.
    pub tool_cost: f64,
    pub log: Vec<LogEntry>,
}

/// Drives the parse → plan → (execute → decide)* → synthesize protocol.
///
/// No state persists across individual model calls; each call resends the
/// full relevant context. Tool executions are strictly sequential, and the
/// whole loop is bounded by `max_iterations`.
pub struct PlanningLoop {
    llm: Arc<dyn LlmClient>,
    engine: ToolExecutionEngine,
    max_iterations: usize,
}

impl PlanningLoop {
    pub fn new(llm: Arc<dyn LlmClient>, engine: ToolExecutionEngine, max_iterations: usize) -> Self {
        Self {
            llm,
            engine,
            max_iterations,
        }
    }

    /// Stage 1: understand what the user wants.
    ///
    /// Unparsable output degrades to the raw input as the intent and the raw
    /// model text as the reasoning; this never aborts a run.
    pub async fn parse_user_input(
        &self,
        user_input: &str,
        agent_instructions: &str,
    ) -> Result<StageOutcome<ParsedIntent>, LlmError> {
        let system = format!(
            "You are an AI agent analyzer. Your job is to understand what the user wants and suggest appropriate actions.\n\n\
             Agent Instructions: {agent_instructions}\n\n\
             Parse the user's input and respond with JSON:\n\
             {{\n\
             \x20 \"intent\": \"brief description of what user wants\",\n\
             \x20 \"reasoning\": \"your analysis of the request\",\n\
             \x20 \"suggestedActions\": [\"action1\", \"action2\", ...]\n\
             }}"
        );

        let (content, cost) = self
            .chat(&[ChatMessage::system(system), ChatMessage::user(user_input)], 0.3, 1000)
            .await?;

        let result = parse_or(&content, |raw| ParsedIntent {
            intent: user_input.to_string(),
            reasoning: raw.to_string(),
            suggested_actions: Vec::new(),
        });

        Ok(StageOutcome { result, cost })
    }

    /// Stage 2: build an ordered plan from the intent and the tool catalog.
    /// Degrades to an empty plan.
    pub async fn create_execution_plan(
        &self,
        intent: &str,
        available_tools: &[&Tool],
    ) -> Result<StageOutcome<ExecutionPlan>, LlmError> {
        let tools_description = available_tools
            .iter()
            .map(|t| format!("- {} ({}): {}", t.name, t.id, t.description))
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!(
            "You are an AI agent planner. Create a step-by-step execution plan using the available tools.\n\n\
             Available Tools:\n{tools_description}\n\n\
             Respond with JSON:\n\
             {{\n\
             \x20 \"steps\": [\n\
             \x20   {{\n\
             \x20     \"toolId\": \"tool_id\",\n\
             \x20     \"toolName\": \"Tool Name\",\n\
             \x20     \"reason\": \"why this tool is needed\",\n\
             \x20     \"parameters\": {{ \"param1\": \"value1\" }}\n\
             \x20   }}\n\
             \x20 ],\n\
             \x20 \"estimatedDuration\": 30\n\
             }}"
        );
        let user = format!("Create an execution plan for: {intent}");

        let (content, cost) = self
            .chat(&[ChatMessage::system(system), ChatMessage::user(user)], 0.2, 2000)
            .await?;

        let result = parse_or(&content, |_| ExecutionPlan::default());
        Ok(StageOutcome { result, cost })
    }

    /// Stage 3: given completed and remaining steps, decide what to do next.
    ///
    /// Degrades to `should_continue = false`: on bad model output the safe
    /// move is to halt, not guess.
    pub async fn decide_next_step(
        &self,
        state: &ExecutionState,
        _available_tools: &[&Tool],
    ) -> Result<StageOutcome<Decision>, LlmError> {
        let system = "You are an AI agent decision maker. Based on the current execution state, decide if we should continue and what to do next.\n\n\
             Respond with JSON:\n\
             {\n\
             \x20 \"shouldContinue\": true/false,\n\
             \x20 \"nextAction\": {\n\
             \x20   \"toolId\": \"tool_id\",\n\
             \x20   \"parameters\": { \"param\": \"value\" }\n\
             \x20 },\n\
             \x20 \"reasoning\": \"explanation of decision\"\n\
             }"
            .to_string();

        let user = serde_json::to_string_pretty(state).unwrap_or_else(|_| "{}".to_string());

        let (content, cost) = self
            .chat(&[ChatMessage::system(system), ChatMessage::user(user)], 0.3, 1000)
            .await?;

        let result = parse_or(&content, |_| Decision {
            should_continue: false,
            next_action: None,
            reasoning: "Failed to parse decision".to_string(),
        });

        Ok(StageOutcome { result, cost })
    }

    /// Stage 4: combine tool outcomes into the final answer.
    /// Degrades to the raw model text as both summary and analysis.
    pub async fn synthesize_results(
        &self,
        original_intent: &str,
        tool_results: &[ToolOutcome],
    ) -> Result<StageOutcome<Synthesis>, LlmError> {
        let results_description = tool_results
            .iter()
            .enumerate()
            .map(|(idx, r)| {
                let output = r.output.to_string();
                let truncated: String = output.chars().take(500).collect();
                format!(
                    "{}. {}: {}\n   Output: {}",
                    idx + 1,
                    r.tool_name,
                    if r.success { "SUCCESS" } else { "FAILED" },
                    truncated
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let system = format!(
            "You are an AI agent synthesizer. Analyze the results from multiple tool executions and create a comprehensive response.\n\n\
             Original Intent: {original_intent}\n\n\
             Tool Results:\n{results_description}\n\n\
             Respond with JSON:\n\
             {{\n\
             \x20 \"summary\": \"brief summary for the user\",\n\
             \x20 \"detailedAnalysis\": \"detailed analysis of what was accomplished\",\n\
             \x20 \"recommendations\": [\"recommendation1\", \"recommendation2\"]\n\
             }}"
        );

        let (content, cost) = self
            .chat(
                &[
                    ChatMessage::system(system),
                    ChatMessage::user("Please synthesize these results into a clear response."),
                ],
                0.4,
                2000,
            )
            .await?;

        let result = parse_or(&content, |raw| Synthesis {
            summary: raw.to_string(),
            detailed_analysis: raw.to_string(),
            recommendations: None,
        });

        Ok(StageOutcome { result, cost })
    }

    /// Run the full protocol for one user input.
    ///
    /// Tools execute strictly in sequence; after each execution the decision
    /// stage is consulted, and the loop stops when it says to stop, when it
    /// names no next action, or at the iteration cap. Hard provider failures
    /// propagate and terminate the run.
    pub async fn run(
        &self,
        agent: &Agent,
        catalog: &[Tool],
        user_input: &str,
    ) -> Result<RunReport, LlmError> {
        let mut log = vec![LogEntry::new(
            LogLevel::Info,
            format!("run started for agent {}", agent.id),
        )];

        // Enabled bindings resolved against the catalog, in list order.
        let available: Vec<&Tool> = agent
            .tools
            .iter()
            .filter(|binding| binding.enabled)
            .filter_map(|binding| {
                let tool = catalog.iter().find(|t| t.id == binding.tool_id);
                if tool.is_none() {
                    tracing::warn!(tool_id = %binding.tool_id, "tool binding not found in catalog");
                }
                tool
            })
            .collect();

        let parsed = self
            .parse_user_input(user_input, &agent.instructions)
            .await?;
        let mut model_cost_total = parsed.cost;
        let intent = parsed.result.into_value();
        log.push(LogEntry::new(
            LogLevel::Info,
            format!("intent: {}", intent.intent),
        ));

        let planned = self
            .create_execution_plan(&intent.intent, &available)
            .await?;
        model_cost_total += planned.cost;
        let plan = planned.result.into_value();
        log.push(LogEntry::new(
            LogLevel::Info,
            format!("plan has {} step(s)", plan.steps.len()),
        ));

        let mut remaining: VecDeque<PlanStep> = plan.steps.iter().cloned().collect();
        let mut steps: Vec<StepRecord> = Vec::new();
        let mut completed: Vec<CompletedStep> = Vec::new();
        let mut tool_cost_total = 0.0;
        let mut iterations = 0;

        // The plan seeds the first action; every later action comes from the
        // decision stage.
        let mut next_action: Option<NextAction> = remaining.pop_front().map(|step| NextAction {
            tool_id: step.tool_id,
            parameters: step.parameters,
        });

        while let Some(action) = next_action.take() {
            if iterations >= self.max_iterations {
                tracing::warn!(cap = self.max_iterations, "iteration cap reached; stopping");
                log.push(LogEntry::new(
                    LogLevel::Warning,
                    format!("iteration cap ({}) reached", self.max_iterations),
                ));
                break;
            }
            iterations += 1;

            let record = self.execute_action(agent, catalog, &action).await;
            tool_cost_total += record.result.cost.unwrap_or(0.0);
            log.push(LogEntry::new(
                if record.result.success {
                    LogLevel::Success
                } else {
                    LogLevel::Error
                },
                format!(
                    "tool {} {}",
                    record.tool_name,
                    if record.result.success { "succeeded" } else { "failed" }
                ),
            ));

            // Drop the matching planned step so the decision stage sees an
            // accurate remainder.
            if remaining
                .front()
                .is_some_and(|step| step.tool_id == action.tool_id)
            {
                remaining.pop_front();
            }

            completed.push(CompletedStep {
                tool_name: record.tool_name.clone(),
                output: step_output(&record.result),
            });
            steps.push(record);

            let state = ExecutionState {
                intent: intent.intent.clone(),
                completed_steps: completed.clone(),
                remaining_steps: remaining
                    .iter()
                    .map(|step| PendingStep {
                        tool_name: step.tool_name.clone(),
                        parameters: step.parameters.clone(),
                    })
                    .collect(),
            };

            let decided = self.decide_next_step(&state, &available).await?;
            model_cost_total += decided.cost;
            let decision = decided.result.into_value();
            log.push(LogEntry::new(
                LogLevel::Debug,
                format!("decision: continue={} ({})", decision.should_continue, decision.reasoning),
            ));

            if !decision.should_continue {
                break;
            }
            next_action = decision.next_action;
        }

        let outcomes: Vec<ToolOutcome> = steps
            .iter()
            .map(|record| ToolOutcome {
                tool_name: record.tool_name.clone(),
                output: step_output(&record.result),
                success: record.result.success,
            })
            .collect();

        let synthesized = self.synthesize_results(&intent.intent, &outcomes).await?;
        model_cost_total += synthesized.cost;
        let synthesis = synthesized.result.into_value();
        log.push(LogEntry::new(LogLevel::Info, "run complete"));

        Ok(RunReport {
            intent,
            plan,
            steps,
            synthesis,
            iterations,
            model_cost: model_cost_total,
            tool_cost: tool_cost_total,
            log,
        })
    }

    /// Execute one action against the catalog, always yielding a step record.
    async fn execute_action(
        &self,
        agent: &Agent,
        catalog: &[Tool],
        action: &NextAction,
    ) -> StepRecord {
        let Some(tool) = catalog.iter().find(|t| t.id == action.tool_id) else {
            return StepRecord {
                id: uuid::Uuid::new_v4(),
                tool_id: action.tool_id.clone(),
                tool_name: action.tool_id.clone(),
                result: ToolExecutionResult {
                    success: false,
                    output: None,
                    error: Some(format!("Unknown tool: {}", action.tool_id)),
                    duration_ms: 0,
                    cost: None,
                },
            };
        };

        // Binding defaults first, then the model-chosen parameters on top.
        let mut parameters: HashMap<String, Value> = agent
            .tools
            .iter()
            .find(|binding| binding.tool_id == tool.id)
            .map(|binding| binding.parameters.clone())
            .unwrap_or_default();
        if let Some(object) = action.parameters.as_object() {
            for (key, value) in object {
                parameters.insert(key.clone(), value.clone());
            }
        }

        let result = self.engine.execute(tool.kind, &tool.config, &parameters).await;

        StepRecord {
            id: uuid::Uuid::new_v4(),
            tool_id: tool.id.clone(),
            tool_name: tool.name.clone(),
            result,
        }
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<(String, f64), LlmError> {
        let options = ChatOptions {
            temperature,
            max_tokens,
            ..Default::default()
        };

        let response = self.llm.chat(messages, &options).await?;
        let cost = model_cost(&response.usage, self.llm.default_model());
        Ok((response.content, cost))
    }
}

/// The value the decision and synthesis stages see for one step.
fn step_output(result: &ToolExecutionResult) -> Value {
    if result.success {
        result.output.clone().unwrap_or(Value::Null)
    } else {
        json!({ "error": result.error })
    }
}
