use std::sync::Arc;

use futures::future::BoxFuture;

use neuragent_core::error::Result;

/// One workflow step.
///
/// A node reads and updates the shared state in place. Its only side
/// effects are calls to the collaborators it was constructed with; every
/// outbound call completes before the returned future resolves.
pub trait Node<S>: Send + Sync + 'static {
    fn run<'a>(&'a self, state: &'a mut S) -> BoxFuture<'a, Result<()>>;
}

/// A pure decision over the state, returning a route label.
pub type Router<S> = Arc<dyn Fn(&S) -> &'static str + Send + Sync>;

/// Adapter so plain async-free closures can serve as nodes in tests and
/// small workflows.
pub struct FnNode<F>(pub F);

impl<S, F> Node<S> for FnNode<F>
where
    S: Send + 'static,
    F: Fn(&mut S) -> Result<()> + Send + Sync + 'static,
{
    fn run<'a>(&'a self, state: &'a mut S) -> BoxFuture<'a, Result<()>> {
        let result = (self.0)(state);
        Box::pin(async move { result })
    }
}
