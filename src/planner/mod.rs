//! The model-driven planning loop: parse → plan → decide → synthesize.
//!
//! Each stage sends the full relevant context to the model and expects a JSON
//! reply; malformed replies take a documented fallback value instead of
//! failing the run. Hard provider errors propagate. The loop is bounded by a
//! configured iteration cap.

mod parse;
mod planning_loop;

pub use parse::{parse_or, ModelOutput};
pub use planning_loop::{
    Decision, ExecutionPlan, NextAction, ParsedIntent, PlanStep, PlanningLoop, RunReport,
    StageOutcome, Synthesis, ToolOutcome,
};
