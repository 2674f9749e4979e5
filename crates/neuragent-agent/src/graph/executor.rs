use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use neuragent_core::config::AgentConfig;
use neuragent_core::error::{AgentError, Result};
use neuragent_core::state::{NodeStatus, WorkflowState};

use super::edge::{Target, Transition, END};
use super::node::Node;

/// Record of a single node execution.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Which node was executed.
    pub node_id: String,
    /// Whether the node returned without error.
    pub succeeded: bool,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of running a graph to completion.
#[derive(Debug)]
pub struct RunOutcome<S> {
    /// The final state.
    pub state: S,
    /// Per-node records in execution order.
    pub steps: Vec<StepRecord>,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

impl<S> RunOutcome<S> {
    /// Node ids in the order they were executed.
    pub fn path(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node_id.as_str()).collect()
    }
}

/// Bounds applied to a single run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Maximum visits of any single node.
    pub max_node_visits: usize,
    /// Whole-run deadline.
    pub deadline: Option<Duration>,
}

impl RunLimits {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_node_visits: config.max_iterations.max(1),
            deadline: (config.max_duration_secs > 0)
                .then(|| Duration::from_secs(config.max_duration_secs)),
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// A validated workflow graph.
///
/// Built once through [`GraphBuilder`] and reusable across runs; each run
/// owns its state exclusively.
pub struct WorkflowGraph<S> {
    entry: String,
    order: Vec<String>,
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    transitions: HashMap<String, Transition<S>>,
}

impl<S> std::fmt::Debug for WorkflowGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.order)
            .field("transitions", &self.transitions)
            .finish()
    }
}

impl<S: WorkflowState> WorkflowGraph<S> {
    /// Start building a graph that begins at `entry`.
    pub fn builder(entry: impl Into<String>) -> GraphBuilder<S> {
        GraphBuilder {
            entry: entry.into(),
            nodes: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> &[String] {
        &self.order
    }

    /// Run the graph from the entry node until it reaches `END`.
    ///
    /// A node that fails is recorded in the state's error log and output
    /// table, and the run continues along its transition. The run itself
    /// fails when a router returns a label with no route, when a node
    /// exceeds its visit cap, or when the deadline passes.
    pub async fn invoke(&self, state: S, limits: &RunLimits) -> Result<RunOutcome<S>> {
        match limits.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.walk(state, limits.max_node_visits))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(deadline_secs = deadline.as_secs(), "Workflow deadline exceeded");
                        Err(AgentError::DeadlineExceeded(deadline.as_secs()))
                    }
                }
            }
            None => self.walk(state, limits.max_node_visits).await,
        }
    }

    async fn walk(&self, mut state: S, max_visits: usize) -> Result<RunOutcome<S>> {
        let start = Instant::now();
        let mut steps = Vec::new();
        let mut visits: HashMap<&str, usize> = HashMap::new();
        let mut current: &str = &self.entry;

        state.agent_mut().set_next(current);

        loop {
            let count = visits.entry(current).or_insert(0);
            *count += 1;
            if *count > max_visits {
                return Err(AgentError::Workflow(format!(
                    "Node '{}' visited more than {} times",
                    current, max_visits
                )));
            }

            let node = self.nodes.get(current).ok_or_else(|| {
                AgentError::Workflow(format!("Node '{}' not found in graph", current))
            })?;

            info!(node_id = current, visit = *count, "Executing workflow node");

            let node_start = Instant::now();
            let succeeded = match node.run(&mut state).await {
                Ok(()) => true,
                Err(e) => {
                    error!(node_id = current, error = %e, "Workflow node failed");
                    let agent = state.agent_mut();
                    agent.record_error(current, e.to_string(), None);
                    agent.record_output(
                        current,
                        serde_json::Value::Null,
                        NodeStatus::Failed,
                        Some(e.to_string()),
                    );
                    false
                }
            };
            let elapsed_ms = node_start.elapsed().as_millis() as u64;

            steps.push(StepRecord {
                node_id: current.to_string(),
                succeeded,
                elapsed_ms,
            });

            let next = self.resolve(current, &state)?;
            debug!(node_id = current, next = next.id(), elapsed_ms, "Node complete");
            state.agent_mut().set_next(next.id());

            match next {
                Target::End => break,
                Target::Node(id) => current = id.as_str(),
            }
        }

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        info!(steps = steps.len(), total_elapsed_ms, "Workflow complete");

        Ok(RunOutcome {
            state,
            steps,
            total_elapsed_ms,
        })
    }

    fn resolve(&self, from: &str, state: &S) -> Result<&Target> {
        match self.transitions.get(from) {
            Some(Transition::Fixed(target)) => Ok(target),
            Some(Transition::Routed { router, routes }) => {
                let label = router(state);
                routes.get(label).ok_or_else(|| {
                    AgentError::Workflow(format!(
                        "Router for '{}' returned unknown route '{}'",
                        from, label
                    ))
                })
            }
            None => Err(AgentError::Workflow(format!(
                "Node '{}' has no outgoing transition",
                from
            ))),
        }
    }

    /// Render the graph as Graphviz DOT.
    pub fn to_dot(&self, layout: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph workflow {{");
        let _ = writeln!(out, "    layout={};", quote(layout));
        let _ = writeln!(out, "    node [shape=box];");
        for id in &self.order {
            if *id == self.entry {
                let _ = writeln!(out, "    {} [style=bold];", quote(id));
            } else {
                let _ = writeln!(out, "    {};", quote(id));
            }
        }
        let _ = writeln!(out, "    {} [shape=doublecircle, label=\"END\"];", quote(END));

        for id in &self.order {
            match self.transitions.get(id) {
                Some(Transition::Fixed(target)) => {
                    let _ = writeln!(out, "    {} -> {};", quote(id), quote(target.id()));
                }
                Some(Transition::Routed { routes, .. }) => {
                    for (label, target) in routes {
                        let _ = writeln!(
                            out,
                            "    {} -> {} [style=dashed, label={}];",
                            quote(id),
                            quote(target.id()),
                            quote(label)
                        );
                    }
                }
                None => {}
            }
        }
        out.push('}');
        out.push('\n');
        out
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Collects nodes and transitions, then validates them in [`build`](Self::build).
pub struct GraphBuilder<S> {
    entry: String,
    nodes: Vec<(String, Arc<dyn Node<S>>)>,
    transitions: Vec<(String, Transition<S>)>,
}

impl<S: WorkflowState> GraphBuilder<S> {
    /// Declare a node.
    pub fn node(mut self, id: impl Into<String>, node: impl Node<S>) -> Self {
        self.nodes.push((id.into(), Arc::new(node)));
        self
    }

    /// Give `from` a fixed successor.
    pub fn edge(mut self, from: impl Into<String>, to: Target) -> Self {
        self.transitions.push((from.into(), Transition::Fixed(to)));
        self
    }

    /// Give `from` a routed successor: `router` runs on the updated state and
    /// its label is looked up in `routes`.
    pub fn routed<R, I, L>(mut self, from: impl Into<String>, router: R, routes: I) -> Self
    where
        R: Fn(&S) -> &'static str + Send + Sync + 'static,
        I: IntoIterator<Item = (L, Target)>,
        L: Into<String>,
    {
        let routes: BTreeMap<String, Target> =
            routes.into_iter().map(|(l, t)| (l.into(), t)).collect();
        self.transitions.push((
            from.into(),
            Transition::Routed {
                router: Arc::new(router),
                routes,
            },
        ));
        self
    }

    pub fn build(self) -> Result<WorkflowGraph<S>> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut nodes = HashMap::new();
        for (id, node) in self.nodes {
            if id.is_empty() || id == END {
                return Err(AgentError::Workflow(format!("Invalid node id '{}'", id)));
            }
            if nodes.insert(id.clone(), node).is_some() {
                return Err(AgentError::Workflow(format!("Duplicate node '{}'", id)));
            }
            order.push(id);
        }

        if !nodes.contains_key(&self.entry) {
            return Err(AgentError::Workflow(format!(
                "Entry node '{}' is not declared",
                self.entry
            )));
        }

        let mut transitions = HashMap::new();
        for (from, transition) in self.transitions {
            if !nodes.contains_key(&from) {
                return Err(AgentError::Workflow(format!(
                    "Transition from undeclared node '{}'",
                    from
                )));
            }
            if let Transition::Routed { routes, .. } = &transition {
                if routes.is_empty() {
                    return Err(AgentError::Workflow(format!(
                        "Routed transition from '{}' has no routes",
                        from
                    )));
                }
            }
            for target in transition.targets() {
                if let Target::Node(to) = target {
                    if !nodes.contains_key(to) {
                        return Err(AgentError::Workflow(format!(
                            "Transition from '{}' targets undeclared node '{}'",
                            from, to
                        )));
                    }
                }
            }
            if transitions.insert(from.clone(), transition).is_some() {
                return Err(AgentError::Workflow(format!(
                    "Node '{}' has more than one transition",
                    from
                )));
            }
        }

        let declared: HashSet<&String> = transitions.keys().collect();
        if let Some(missing) = order.iter().find(|id| !declared.contains(id)) {
            return Err(AgentError::Workflow(format!(
                "Node '{}' has no outgoing transition",
                missing
            )));
        }

        Ok(WorkflowGraph {
            entry: self.entry,
            order,
            nodes,
            transitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::FnNode;
    use futures::future::BoxFuture;
    use neuragent_core::state::AgentState;

    #[derive(Debug, Default)]
    struct Counter {
        agent: AgentState,
        hits: u32,
    }

    impl WorkflowState for Counter {
        fn agent(&self) -> &AgentState {
            &self.agent
        }
        fn agent_mut(&mut self) -> &mut AgentState {
            &mut self.agent
        }
    }

    fn bump() -> FnNode<impl Fn(&mut Counter) -> Result<()> + Send + Sync + 'static> {
        FnNode(|s: &mut Counter| -> Result<()> {
            s.hits += 1;
            Ok(())
        })
    }

    fn unbounded() -> RunLimits {
        RunLimits {
            max_node_visits: 10,
            deadline: None,
        }
    }

    struct Sleepy(Duration);

    impl Node<Counter> for Sleepy {
        fn run<'a>(&'a self, _state: &'a mut Counter) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                tokio::time::sleep(self.0).await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_linear_run_updates_cursor() {
        let graph = WorkflowGraph::builder("a")
            .node("a", bump())
            .node("b", bump())
            .edge("a", Target::node("b"))
            .edge("b", Target::End)
            .build()
            .unwrap();

        let outcome = graph.invoke(Counter::default(), &unbounded()).await.unwrap();
        assert_eq!(outcome.path(), vec!["a", "b"]);
        assert!(outcome.steps.iter().all(|s| s.succeeded));
        assert_eq!(outcome.state.hits, 2);
        assert_eq!(outcome.state.agent.current_node.as_deref(), Some("b"));
        assert_eq!(outcome.state.agent.next_node.as_deref(), Some(END));
    }

    #[tokio::test]
    async fn test_routed_loop_terminates() {
        let graph = WorkflowGraph::builder("a")
            .node("a", bump())
            .routed(
                "a",
                |s: &Counter| if s.hits < 3 { "again" } else { "done" },
                [("again", Target::node("a")), ("done", Target::End)],
            )
            .build()
            .unwrap();

        let outcome = graph.invoke(Counter::default(), &unbounded()).await.unwrap();
        assert_eq!(outcome.path(), vec!["a", "a", "a"]);
        assert_eq!(outcome.state.hits, 3);
    }

    #[tokio::test]
    async fn test_visit_cap_enforced() {
        let graph = WorkflowGraph::builder("a")
            .node("a", bump())
            .edge("a", Target::node("a"))
            .build()
            .unwrap();

        let limits = RunLimits {
            max_node_visits: 2,
            deadline: None,
        };
        let err = graph.invoke(Counter::default(), &limits).await.unwrap_err();
        assert!(matches!(err, AgentError::Workflow(_)));
        assert!(err.to_string().contains("more than 2 times"));
    }

    #[tokio::test]
    async fn test_node_error_recorded_and_run_continues() {
        let graph = WorkflowGraph::builder("fail")
            .node(
                "fail",
                FnNode(|_: &mut Counter| -> Result<()> {
                    Err(AgentError::Service("boom".into()))
                }),
            )
            .node("after", bump())
            .edge("fail", Target::node("after"))
            .edge("after", Target::End)
            .build()
            .unwrap();

        let outcome = graph.invoke(Counter::default(), &unbounded()).await.unwrap();
        assert_eq!(outcome.path(), vec!["fail", "after"]);
        assert!(!outcome.steps[0].succeeded);
        assert_eq!(outcome.state.hits, 1);

        let agent = &outcome.state.agent;
        assert_eq!(agent.errors().len(), 1);
        assert_eq!(agent.errors()[0].node, "fail");
        assert!(agent.errors()[0].message.contains("boom"));
        let output = agent.node_output("fail").unwrap();
        assert_eq!(output.status, NodeStatus::Failed);
        assert!(output.output.is_null());
    }

    #[tokio::test]
    async fn test_unknown_route_fails_fast() {
        let graph = WorkflowGraph::builder("a")
            .node("a", bump())
            .routed("a", |_: &Counter| "nowhere", [("done", Target::End)])
            .build()
            .unwrap();

        let err = graph.invoke(Counter::default(), &unbounded()).await.unwrap_err();
        assert!(matches!(err, AgentError::Workflow(_)));
        assert!(err.to_string().contains("'nowhere'"));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let graph = WorkflowGraph::builder("slow")
            .node("slow", Sleepy(Duration::from_millis(500)))
            .edge("slow", Target::End)
            .build()
            .unwrap();

        let limits = RunLimits {
            max_node_visits: 10,
            deadline: Some(Duration::from_millis(20)),
        };
        let err = graph.invoke(Counter::default(), &limits).await.unwrap_err();
        assert!(matches!(err, AgentError::DeadlineExceeded(_)));
    }

    #[test]
    fn test_build_rejects_invalid_graphs() {
        let missing_entry = WorkflowGraph::<Counter>::builder("x")
            .node("a", bump())
            .edge("a", Target::End)
            .build();
        assert!(missing_entry.is_err());

        let dangling = WorkflowGraph::<Counter>::builder("a")
            .node("a", bump())
            .edge("a", Target::node("ghost"))
            .build();
        assert!(dangling.unwrap_err().to_string().contains("ghost"));

        let no_transition = WorkflowGraph::<Counter>::builder("a")
            .node("a", bump())
            .node("b", bump())
            .edge("a", Target::End)
            .build();
        assert!(no_transition.unwrap_err().to_string().contains("'b'"));

        let undeclared_source = WorkflowGraph::<Counter>::builder("a")
            .node("a", bump())
            .edge("a", Target::End)
            .edge("z", Target::End)
            .build();
        assert!(undeclared_source.is_err());

        let empty_routes = WorkflowGraph::<Counter>::builder("a")
            .node("a", bump())
            .routed("a", |_: &Counter| "x", Vec::<(String, Target)>::new())
            .build();
        assert!(empty_routes.is_err());

        let duplicate = WorkflowGraph::<Counter>::builder("a")
            .node("a", bump())
            .node("a", bump())
            .edge("a", Target::End)
            .build();
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_run_limits_from_config() {
        let mut config = AgentConfig::default();
        let limits = RunLimits::from_config(&config);
        assert_eq!(limits.max_node_visits, 10);
        assert_eq!(limits.deadline, Some(Duration::from_secs(300)));

        config.max_duration_secs = 0;
        config.max_iterations = 0;
        let limits = RunLimits::from_config(&config);
        assert_eq!(limits.deadline, None);
        assert_eq!(limits.max_node_visits, 1);
    }

    #[test]
    fn test_to_dot() {
        let graph = WorkflowGraph::builder("a")
            .node("a", bump())
            .node("b", bump())
            .edge("a", Target::node("b"))
            .routed(
                "b",
                |_: &Counter| "done",
                [("again", Target::node("a")), ("done", Target::End)],
            )
            .build()
            .unwrap();

        let dot = graph.to_dot("dot");
        assert!(dot.starts_with("digraph workflow {"));
        assert!(dot.contains("\"a\" [style=bold];"));
        assert!(dot.contains("\"__end__\" [shape=doublecircle, label=\"END\"];"));
        assert!(dot.contains("\"a\" -> \"b\";"));
        assert!(dot.contains("\"b\" -> \"a\" [style=dashed, label=\"again\"];"));
        assert!(dot.contains("\"b\" -> \"__end__\" [style=dashed, label=\"done\"];"));
        assert_eq!(graph.node_ids(), ["a".to_string(), "b".to_string()]);
    }
}
