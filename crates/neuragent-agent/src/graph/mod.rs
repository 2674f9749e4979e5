//! Workflow graph engine.
//!
//! A workflow is a set of named [`Node`]s, each with exactly one
//! [`Transition`]: a fixed successor, or a router plus a table mapping the
//! router's label to a successor. A graph is validated once when built;
//! [`WorkflowGraph::invoke`] then walks it from the entry node, threading a
//! single mutable state through every node until the `END` marker.

pub mod edge;
pub mod executor;
pub mod node;

pub use edge::{Target, Transition, END};
pub use executor::{GraphBuilder, RunLimits, RunOutcome, StepRecord, WorkflowGraph};
pub use node::{FnNode, Node, Router};
