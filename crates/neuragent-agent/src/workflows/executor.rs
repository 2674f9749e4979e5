use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use neuragent_core::error::{AgentError, Result};
use neuragent_core::state::{AgentState, NodeStatus, WorkflowState};
use neuragent_core::traits::{CompletionService, FileStore};
use neuragent_core::types::{ChatMessage, Role};

use super::classify::{classify, TaskKind};
use super::{build_request, latest_query, nonempty_lines};
use crate::graph::{Node, Target, WorkflowGraph};

pub const PARSE_TASKS: &str = "parse_tasks";
pub const EXECUTE_TASKS: &str = "execute_tasks";
pub const FINAL_REPORT: &str = "final_report";
/// Router label for a finished run.
pub const ROUTE_END: &str = "end";

/// Result text for a write task whose reply lacks the `CONTENT:` marker.
pub const WRITE_PARSE_FAILURE: &str = "Failed to parse file path and content";

const SYSTEM_PROMPT: &str = "You are an executor agent that can perform tasks based on instructions.
You have the following capabilities:
1. Reading files
2. Writing files
3. Executing general tasks that involve reasoning and planning

Follow instructions precisely and report back your results in a clear, structured format.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<String>,
}

/// State of an executor run.
///
/// Tasks are executed in listing order; `current_task_index` points at the
/// first pending task.
#[derive(Debug, Clone, Default)]
pub struct ExecutorState {
    pub agent: AgentState,
    tasks: Vec<Task>,
    current_task_index: usize,
    completed: Vec<usize>,
    report: Option<String>,
}

impl ExecutorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task, classifying it from its description.
    pub fn add_task(&mut self, description: impl Into<String>) {
        let description = description.into();
        self.tasks.push(Task {
            kind: classify(&description),
            description,
            status: TaskStatus::Pending,
            result: None,
        });
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn current_task_index(&self) -> usize {
        self.current_task_index
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current_task_index)
    }

    /// Mark the current task completed with `result` and advance.
    pub fn complete_current(&mut self, result: impl Into<String>) {
        if let Some(task) = self.tasks.get_mut(self.current_task_index) {
            task.status = TaskStatus::Completed;
            task.result = Some(result.into());
            self.completed.push(self.current_task_index);
            self.current_task_index += 1;
        }
    }

    /// Completed tasks in completion order.
    pub fn completed_tasks(&self) -> impl Iterator<Item = &Task> {
        self.completed.iter().filter_map(|&i| self.tasks.get(i))
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn set_report(&mut self, report: impl Into<String>) {
        self.report = Some(report.into());
    }
}

impl WorkflowState for ExecutorState {
    fn agent(&self) -> &AgentState {
        &self.agent
    }

    fn agent_mut(&mut self) -> &mut AgentState {
        &mut self.agent
    }
}

/// Route an executor run. Checked in order: no tasks yet, pending tasks,
/// missing report.
pub fn decide_next_step(state: &ExecutorState) -> &'static str {
    if state.tasks.is_empty() {
        PARSE_TASKS
    } else if state.current_task_index < state.tasks.len() {
        EXECUTE_TASKS
    } else if state.report.is_none() {
        FINAL_REPORT
    } else {
        ROUTE_END
    }
}

/// Asks the model to break the request into tasks.
pub struct ParseTasks {
    llm: Arc<dyn CompletionService>,
}

impl ParseTasks {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }
}

impl Node<ExecutorState> for ParseTasks {
    fn run<'a>(&'a self, state: &'a mut ExecutorState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!("Parsing tasks from user request");
            let query = latest_query(state.agent.thread())?;
            let request = build_request(
                SYSTEM_PROMPT,
                state.agent.thread(),
                format!(
                    "I need you to execute the following:\n\n{}\n\n\
                     Break this down into a list of specific tasks that need to be performed. \
                     List each task on a separate line.",
                    query
                ),
            );

            let reply = self.llm.complete(request).await?;
            let tasks = nonempty_lines(&reply);
            debug!(count = tasks.len(), "Tasks parsed");
            for task in &tasks {
                state.add_task(task.as_str());
            }

            state
                .agent
                .record_output(PARSE_TASKS, json!(tasks), NodeStatus::Completed, None);
            Ok(())
        })
    }
}

/// Runs every pending task in order. Each task ends completed with a
/// result text, including when its branch failed.
pub struct ExecuteTasks {
    llm: Arc<dyn CompletionService>,
    files: Arc<dyn FileStore>,
}

impl ExecuteTasks {
    pub fn new(llm: Arc<dyn CompletionService>, files: Arc<dyn FileStore>) -> Self {
        Self { llm, files }
    }

    async fn ask(&self, description: &str, instruction: &str) -> Result<String> {
        let request = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "I need to execute this task: {}\n\n{}",
                description, instruction
            )),
        ];
        self.llm.complete(request).await
    }

    async fn read_file(&self, agent: &mut AgentState, description: &str) -> Result<String> {
        let reply = self
            .ask(
                description,
                "What file path should I read from? Extract just the file path.",
            )
            .await?;
        let path = reply.trim();
        let res = self.files.read(path, 0, None).await;
        if res.is_error {
            warn!(path, error = %res.content, "File read failed");
            agent.record_error(
                EXECUTE_TASKS,
                res.content.clone(),
                Some(json!({ "task": description, "path": path })),
            );
        }
        Ok(res.content)
    }

    async fn write_file(&self, agent: &mut AgentState, description: &str) -> Result<String> {
        let reply = self
            .ask(
                description,
                "Provide the file path and content I should write in this format:\n\
                 FILE PATH: <path>\nCONTENT:\n<content>",
            )
            .await?;

        let Some((path, content)) = parse_write_reply(&reply) else {
            warn!(task = description, "Write reply lacks a file path or content marker");
            let err = AgentError::Parse(WRITE_PARSE_FAILURE.to_string());
            agent.record_error(
                EXECUTE_TASKS,
                err.to_string(),
                Some(json!({ "error_type": "ParseError", "task": description })),
            );
            return Ok(WRITE_PARSE_FAILURE.to_string());
        };

        let res = self.files.write(path, content, false).await;
        if res.is_error {
            warn!(path, error = %res.content, "File write failed");
            agent.record_error(
                EXECUTE_TASKS,
                res.content.clone(),
                Some(json!({ "task": description, "path": path })),
            );
        }
        Ok(res.content)
    }

    async fn general(&self, description: &str) -> Result<String> {
        self.ask(
            description,
            "Provide a step-by-step approach to complete this task and then execute it. \
             Report your result.",
        )
        .await
    }
}

impl Node<ExecutorState> for ExecuteTasks {
    fn run<'a>(&'a self, state: &'a mut ExecutorState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut executed = Vec::new();

            while let Some(task) = state.current_task() {
                let description = task.description.clone();
                let kind = task.kind;
                info!(task = %description, kind = kind.as_str(), "Executing task");

                let outcome = match kind {
                    TaskKind::ReadFile => self.read_file(&mut state.agent, &description).await,
                    TaskKind::WriteFile => self.write_file(&mut state.agent, &description).await,
                    TaskKind::General => self.general(&description).await,
                };
                let result = match outcome {
                    Ok(text) => text,
                    Err(e) => {
                        error!(task = %description, error = %e, "Task failed");
                        state.agent.record_error(
                            EXECUTE_TASKS,
                            e.to_string(),
                            Some(json!({ "task": description })),
                        );
                        format!("Task failed: {}", e)
                    }
                };

                executed.push(json!({ "task": description, "result": result }));
                state.complete_current(result);
            }

            if executed.is_empty() {
                debug!("No tasks to execute");
                return Ok(());
            }
            state.agent.record_output(
                EXECUTE_TASKS,
                serde_json::Value::Array(executed),
                NodeStatus::Completed,
                None,
            );
            Ok(())
        })
    }
}

/// Split a `FILE PATH: <path>\nCONTENT:\n<content>` reply.
fn parse_write_reply(reply: &str) -> Option<(&str, &str)> {
    let (head, body) = reply.split_once("CONTENT:")?;
    let path = head.trim();
    let path = path.strip_prefix("FILE PATH:").unwrap_or(path).trim();
    if path.is_empty() {
        return None;
    }
    Some((path, body.trim()))
}

/// Summarizes the completed tasks into the final answer.
pub struct FinalReport {
    llm: Arc<dyn CompletionService>,
}

impl FinalReport {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }
}

impl Node<ExecutorState> for FinalReport {
    fn run<'a>(&'a self, state: &'a mut ExecutorState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if state.report.is_some() {
                debug!("Report already present");
                return Ok(());
            }
            info!("Creating final report");

            let tasks_text: String = state
                .completed_tasks()
                .enumerate()
                .map(|(i, task)| {
                    format!(
                        "## Task {}: {}\n\n**Result:** {}\n\n",
                        i + 1,
                        task.description,
                        task.result.as_deref().unwrap_or("")
                    )
                })
                .collect();
            let request = vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "I've completed the following tasks:\n\n{}\n\n\
                     Provide a summary report of what was accomplished.",
                    tasks_text
                )),
            ];

            let report = self.llm.complete(request).await?;
            state.set_report(report.clone());
            state.agent.add_message(Role::Assistant, report.clone());
            state
                .agent
                .record_output(FINAL_REPORT, json!(report), NodeStatus::Completed, None);
            Ok(())
        })
    }
}

/// Parse, execute until no task is pending, then report.
pub fn executor_graph(
    llm: Arc<dyn CompletionService>,
    files: Arc<dyn FileStore>,
) -> Result<WorkflowGraph<ExecutorState>> {
    WorkflowGraph::builder(PARSE_TASKS)
        .node(PARSE_TASKS, ParseTasks::new(llm.clone()))
        .node(EXECUTE_TASKS, ExecuteTasks::new(llm.clone(), files))
        .node(FINAL_REPORT, FinalReport::new(llm))
        .edge(PARSE_TASKS, Target::node(EXECUTE_TASKS))
        .routed(
            EXECUTE_TASKS,
            decide_next_step,
            [
                (PARSE_TASKS, Target::node(PARSE_TASKS)),
                (EXECUTE_TASKS, Target::node(EXECUTE_TASKS)),
                (FINAL_REPORT, Target::node(FINAL_REPORT)),
                (ROUTE_END, Target::End),
            ],
        )
        .edge(FINAL_REPORT, Target::End)
        .build()
}
