use std::collections::BTreeMap;

use super::node::Router;

/// Cursor value recorded in the state once a run reaches the terminal marker.
pub const END: &str = "__end__";

/// Successor of a node: another node, or the terminal marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Node(String),
    End,
}

impl Target {
    pub fn node(id: impl Into<String>) -> Self {
        Target::Node(id.into())
    }

    /// Identifier as written to the state cursor and DOT output.
    pub fn id(&self) -> &str {
        match self {
            Target::Node(id) => id,
            Target::End => END,
        }
    }
}

/// Outgoing transition of a node.
pub enum Transition<S> {
    /// Always continue to the same successor.
    Fixed(Target),
    /// Evaluate the router on the updated state and look its label up.
    Routed {
        router: Router<S>,
        routes: BTreeMap<String, Target>,
    },
}

impl<S> Transition<S> {
    /// Every successor this transition can produce.
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            Transition::Fixed(t) => vec![t],
            Transition::Routed { routes, .. } => routes.values().collect(),
        }
    }
}

impl<S> std::fmt::Debug for Transition<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Fixed(t) => f.debug_tuple("Fixed").field(t).finish(),
            Transition::Routed { routes, .. } => {
                f.debug_struct("Routed").field("routes", routes).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_target_ids() {
        assert_eq!(Target::node("research").id(), "research");
        assert_eq!(Target::End.id(), END);
    }

    #[test]
    fn test_transition_targets() {
        let fixed: Transition<()> = Transition::Fixed(Target::node("b"));
        assert_eq!(fixed.targets(), vec![&Target::node("b")]);

        let mut routes = BTreeMap::new();
        routes.insert("again".to_string(), Target::node("a"));
        routes.insert("done".to_string(), Target::End);
        let routed: Transition<()> = Transition::Routed {
            router: Arc::new(|_: &()| "done"),
            routes,
        };
        assert_eq!(routed.targets().len(), 2);
        assert!(format!("{:?}", routed).contains("Routed"));
    }
}
