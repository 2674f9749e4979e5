pub mod config;
pub mod error;
pub mod state;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{AgentError, Result};
pub use state::{AgentState, ErrorRecord, NodeOutput, NodeStatus, WorkflowState};
pub use types::*;
