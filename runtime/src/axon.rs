//! # Axon: Executable Workflow Pipeline
//!
//! An `Axon` is a labelled, reusable chain of [`Transition`]s. Each node
//! receives the previous node's output and the shared [`Bus`]; the first
//! `Outcome::Fault` stops the chain.
//!
//! ```rust,ignore
//! let axon = Axon::<ActionRequest, ActionRequest, WishError>::new("wish.workflow")
//!     .then(LoadWish)
//!     .then(PlanAction)
//!     .then(PersistPatch);
//!
//! let applied = axon.execute(request, &mut bus).await;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tandem_core::bus::Bus;
use tandem_core::outcome::Outcome;
use tandem_core::transition::Transition;
use tracing::Instrument;

/// Type alias for async boxed futures used in Axon execution.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executor type for Axon steps.
/// Must be Send + Sync to be reusable across threads and clones.
pub type Executor<In, Out, E> =
    Arc<dyn for<'a> Fn(In, &'a mut Bus) -> BoxFuture<'a, Outcome<Out, E>> + Send + Sync>;

/// Pins the higher-ranked signature onto a closure.
fn executor<In, Out, E, F>(f: F) -> Executor<In, Out, E>
where
    F: for<'a> Fn(In, &'a mut Bus) -> BoxFuture<'a, Outcome<Out, E>> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub struct Axon<In, Out, E> {
    label: String,
    nodes: Vec<&'static str>,
    executor: Executor<In, Out, E>,
}

impl<In, Out, E> Clone for Axon<In, Out, E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            nodes: self.nodes.clone(),
            executor: self.executor.clone(),
        }
    }
}

impl<In, E> Axon<In, In, E>
where
    In: Send + 'static,
    E: Send + 'static,
{
    /// Start an identity Axon (In -> In) with the given label.
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            nodes: Vec::new(),
            executor: executor(|input: In, _bus: &mut Bus| {
                Box::pin(std::future::ready(Outcome::Next(input))) as BoxFuture<'_, _>
            }),
        }
    }
}

impl<In, Out, E> Axon<In, Out, E>
where
    In: Send + 'static,
    Out: Send + 'static,
    E: Send + 'static,
{
    /// Chain a transition to this Axon.
    pub fn then<Next, Trans>(self, transition: Trans) -> Axon<In, Next, E>
    where
        Next: Send + 'static,
        Trans: Transition<Out, Next, Error = E>,
    {
        let Axon {
            label,
            mut nodes,
            executor: prev,
        } = self;
        nodes.push(transition.label());

        let transition = Arc::new(transition);
        let next = executor(move |input: In, bus: &mut Bus| {
            let prev = prev.clone();
            let transition = transition.clone();
            Box::pin(async move {
                let state = match prev(input, bus).await {
                    Outcome::Next(state) => state,
                    Outcome::Fault(e) => return Outcome::Fault(e),
                };
                transition.run(state, bus).await
            }) as BoxFuture<'_, _>
        });

        Axon {
            label,
            nodes,
            executor: next,
        }
    }

    /// Execute the Axon with the given input.
    pub async fn execute(&self, input: In, bus: &mut Bus) -> Outcome<Out, E> {
        async move { (self.executor)(input, bus).await }
            .instrument(tracing::info_span!("Axon", tandem.axon = %self.label))
            .await
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Node labels in execution order.
    pub fn nodes(&self) -> &[&'static str] {
        &self.nodes
    }
}
