//! Bus - Type-Safe Resource Injection
//!
//! The Bus carries the application context into workflow nodes: the store
//! handle, the change feed, the clock and the signed-in session. Each is
//! keyed by its type, so there are no string keys and no ambient globals.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

/// A resource a node needed was never placed on the Bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("resource `{0}` is not on the bus")]
pub struct MissingResource(pub &'static str);

/// Type-safe resource container (TypeMap pattern).
#[derive(Default)]
pub struct Bus {
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Bus {
    /// Create a new empty Bus
    pub fn new() -> Self {
        Bus {
            resources: HashMap::new(),
        }
    }

    /// Insert a resource into the Bus.
    ///
    /// If a resource of this type already exists, it is replaced.
    pub fn insert<T: Send + Sync + 'static>(&mut self, resource: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(resource));
    }

    /// Builder form of [`Bus::insert`].
    pub fn with<T: Send + Sync + 'static>(mut self, resource: T) -> Self {
        self.insert(resource);
        self
    }

    /// Get a reference to a resource.
    ///
    /// Returns `None` if the resource type is not present.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Like [`Bus::get`], but names the missing type in the error.
    pub fn require<T: 'static>(&self) -> Result<&T, MissingResource> {
        self.get::<T>().ok_or(MissingResource(type_name::<T>()))
    }

    /// Get a mutable reference to a resource.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Check if a resource type is present.
    pub fn contains<T: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Remove a resource from the Bus, returning it if present.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok())
            .map(|boxed| *boxed)
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("resource_count", &self.resources.len())
            .finish()
    }
}
