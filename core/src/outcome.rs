use serde::{Deserialize, Serialize};

/// The explicit result of a transition in the Axon.
///
/// `Outcome` represents "Control Flow as Data": every node returns one, and
/// the Axon stops at the first `Fault`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T, E> {
    /// Proceed to the next node
    Next(T),

    /// A structural fault (Error path)
    Fault(E),
}

impl<T, E> Outcome<T, E> {
    pub fn map<U, F: FnOnce(T) -> U>(self, op: F) -> Outcome<U, E> {
        match self {
            Outcome::Next(t) => Outcome::Next(op(t)),
            Outcome::Fault(e) => Outcome::Fault(e),
        }
    }

    pub fn map_fault<E2, F: FnOnce(E) -> E2>(self, op: F) -> Outcome<T, E2> {
        match self {
            Outcome::Next(t) => Outcome::Next(t),
            Outcome::Fault(e) => Outcome::Fault(op(e)),
        }
    }

    pub fn is_next(&self) -> bool {
        matches!(self, Outcome::Next(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Outcome::Next(t) => Ok(t),
            Outcome::Fault(e) => Err(e),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(t) => Outcome::Next(t),
            Err(e) => Outcome::Fault(e),
        }
    }
}
