use crate::bus::Bus;
use crate::outcome::Outcome;
use async_trait::async_trait;

/// The contract for a Typed State Transition.
///
/// `Transition` converts state `From` to `Outcome<To, Error>`, reading the
/// collaborators it needs from the `Bus`.
#[async_trait]
pub trait Transition<From, To>: Send + Sync + 'static
where
    From: Send + 'static,
    To: Send + 'static,
{
    /// Domain-specific error type
    type Error: Send + Sync + 'static;

    /// Human-readable node name used in spans. Defaults to the type name.
    fn label(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Execute the transition
    async fn run(&self, state: From, bus: &mut Bus) -> Outcome<To, Self::Error>;
}
