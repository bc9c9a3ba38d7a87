//! agentflow - headless entry point.
//!
//! Usage:
//!   agentflow compile <bundle.json>          print the compiled workflow YAML
//!   agentflow deploy  <bundle.json>          compile and upsert into the engine
//!   agentflow run     <bundle.json> <input>  drive the planning loop once
//!
//! A bundle file holds the agent record and the tool catalog it references:
//! `{"agent": {...}, "catalog": [{...}, ...]}`.

use std::sync::Arc;

use agentflow::compiler::AgentWorkflowCompiler;
use agentflow::config::Config;
use agentflow::kestra::KestraClient;
use agentflow::llm::OpenAiCompatClient;
use agentflow::planner::PlanningLoop;
use agentflow::tools::ToolExecutionEngine;
use agentflow::types::{Agent, Tool};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Deserialize)]
struct AgentBundle {
    agent: Agent,
    #[serde(default)]
    catalog: Vec<Tool>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let bundle_path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: agentflow <compile|deploy|run> <bundle.json> [input]"))?;

    let bundle: AgentBundle =
        serde_json::from_str(&tokio::fs::read_to_string(&bundle_path).await?)?;
    info!(agent = %bundle.agent.id, "loaded agent bundle");

    let config = Config::from_env()?;

    match command.as_str() {
        "compile" => {
            let runtime = Arc::new(KestraClient::new(&config.kestra));
            let compiler = AgentWorkflowCompiler::new(runtime);
            print!("{}", compiler.compile(&bundle.agent).yaml);
        }
        "deploy" => {
            let runtime = Arc::new(KestraClient::new(&config.kestra));
            let compiler = AgentWorkflowCompiler::new(runtime);
            let deployed = compiler.deploy(&bundle.agent).await?;
            println!("deployed {}", deployed.workflow_id);
        }
        "run" => {
            let input = args
                .next()
                .ok_or_else(|| anyhow::anyhow!("run requires an input string"))?;

            let llm = Arc::new(OpenAiCompatClient::new(config.openrouter.clone()));
            let planner = PlanningLoop::new(llm, ToolExecutionEngine::new(), config.max_iterations);

            let report = planner.run(&bundle.agent, &bundle.catalog, &input).await?;
            println!("{}", report.synthesis.summary);
            println!();
            println!("{}", report.synthesis.detailed_analysis);
            info!(
                iterations = report.iterations,
                model_cost = report.model_cost,
                tool_cost = report.tool_cost,
                "run finished"
            );
        }
        other => {
            anyhow::bail!("unknown command: {:?} (expected compile, deploy, or run)", other);
        }
    }

    Ok(())
}
