pub mod factory;
pub mod graph;
pub mod workflows;

pub use factory::{AgentFactory, AgentKind, AgentReply, NO_RESPONSE, NO_RESULTS};
pub use graph::{RunLimits, RunOutcome, Target, WorkflowGraph, END};
pub use workflows::classify::{classify, TaskKind};
pub use workflows::executor::{executor_graph, ExecutorState};
pub use workflows::researcher::{researcher_graph, ResearcherState};
