//! # Telemetry: Observability Decorators
//!
//! This module provides decorators for adding observability to Transitions.

use crate::bus::Bus;
use crate::outcome::Outcome;
use crate::transition::Transition;
use async_trait::async_trait;
use std::fmt::Debug;

/// A wrapper Transition that adds telemetry (tracing) to any inner Transition.
#[derive(Clone)]
pub struct Traced<T> {
    inner: T,
    name: &'static str,
}

impl<T> Traced<T> {
    pub fn new(inner: T, name: &'static str) -> Self {
        Self { inner, name }
    }
}

#[async_trait]
impl<T, From, To> Transition<From, To> for Traced<T>
where
    T: Transition<From, To>,
    T::Error: Debug,
    From: Send + 'static + Debug,
    To: Send + 'static + Debug,
{
    type Error = T::Error;

    fn label(&self) -> &'static str {
        self.name
    }

    async fn run(&self, input: From, bus: &mut Bus) -> Outcome<To, Self::Error> {
        use tracing::{Instrument, info_span};

        let span = info_span!("Node", tandem.node = %self.name);

        async move {
            tracing::debug!(?input, "Entering node transition");
            let start = std::time::Instant::now();

            let result = self.inner.run(input, bus).await;

            let duration = start.elapsed();
            match &result {
                Outcome::Next(val) => {
                    tracing::debug!(?val, ?duration, "Transition completed: Next");
                }
                Outcome::Fault(e) => {
                    tracing::warn!(error = ?e, ?duration, "Transition failed: Fault");
                }
            }
            result
        }
        .instrument(span)
        .await
    }
}
