//! # agentflow
//!
//! Compiles declarative agent descriptions into executable workflow
//! definitions and drives them with model decisions.
//!
//! This library provides:
//! - A compiler from agent records to Kestra workflow definitions
//! - A uniform execution engine over heterogeneous tool kinds
//! - A model-driven planning loop that turns free-form model text into typed
//!   execution decisions with defined degrade paths
//!
//! ## Architecture
//!
//! Data flows one direction at compile time and one direction at run time:
//! 1. Compile: agent record → workflow YAML → upserted into the engine
//! 2. Run: user input → planning loop → sequential tool calls → synthesis
//!
//! Clients (workflow engine, model provider) are constructed explicitly and
//! injected; nothing here is a process-wide singleton.
//!
//! ## Example
//!
//! ```rust,ignore
//! use agentflow::{compiler::AgentWorkflowCompiler, config::Config, kestra::KestraClient};
//!
//! let config = Config::from_env()?;
//! let runtime = Arc::new(KestraClient::new(&config.kestra));
//! let compiler = AgentWorkflowCompiler::new(runtime);
//! let deployed = compiler.deploy(&agent).await?;
//! ```

pub mod compiler;
pub mod config;
pub mod kestra;
pub mod llm;
pub mod planner;
pub mod tools;
pub mod types;

pub use config::Config;
