//! Tool execution: a uniform engine over heterogeneous capability kinds.
//!
//! The engine executes exactly one tool invocation at a time and always hands
//! back a [`ToolExecutionResult`](crate::types::ToolExecutionResult); build or
//! transport errors are captured into the envelope, never thrown past the
//! execution boundary. Tools within one planning cycle run strictly
//! sequentially because a later tool's parameters may depend on an earlier
//! tool's output.

mod engine;
mod template;

pub use engine::{execution_cost, ToolExecutionEngine};
pub use template::{substitute_placeholders, Escaping};
