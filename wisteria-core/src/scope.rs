//! Bean scopes.

use std::fmt;

use crate::error::ContainerResult;
use crate::value::BeanInstance;

/// Lifetime of instances produced for a definition.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub enum BeanScope {
    /// One shared instance per container, cached on first creation.
    #[default]
    Singleton,
    /// A fresh instance on every request, never cached or destroyed by the
    /// container.
    Prototype,
    /// Delegated to a registered [`ScopeStrategy`].
    Custom(String),
}

impl BeanScope {
    pub fn is_singleton(&self) -> bool {
        matches!(self, BeanScope::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self, BeanScope::Prototype)
    }
}

impl fmt::Display for BeanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanScope::Singleton => write!(f, "singleton"),
            BeanScope::Prototype => write!(f, "prototype"),
            BeanScope::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Storage strategy for a custom scope (request, session, and the like).
///
/// The strategy decides when to call `create` and how long to retain what it
/// returns; the factory runs its full creation pipeline inside `create`.
pub trait ScopeStrategy: Send + Sync {
    fn get(
        &self,
        name: &str,
        create: &mut dyn FnMut() -> ContainerResult<BeanInstance>,
    ) -> ContainerResult<BeanInstance>;

    /// Removes and returns the instance held under `name`, if any.
    fn remove(&self, name: &str) -> Option<BeanInstance>;
}
