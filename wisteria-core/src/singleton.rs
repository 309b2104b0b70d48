//! Shared-instance registry.
//!
//! The registry owns the singleton cache, the in-creation bookkeeping that
//! makes creation single-flight per name, and the dependent-bean graph that
//! drives destruction ordering. Same-thread re-entry for a name that is
//! already being created is a circular dependency; a different thread blocks
//! until the first creation settles and then reuses (or retries) it. Before
//! blocking, the registry walks the wait-for graph across threads, so a
//! cycle split over several threads is reported as a circular dependency
//! instead of deadlocking.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::warn;

use crate::error::{ContainerError, ContainerResult};
use crate::factory::{BeanFactory, DefaultListableBeanFactory};
use crate::utils::dependency::topological_sort;
use crate::value::{BeanInstance, BeanValue};

/// A by-name reference to a bean that may not exist yet.
///
/// Early handles are produced while their bean is mid-creation and share the
/// creation slot, which is filled with the final instance once the pipeline
/// completes; lazy handles defer creation entirely and resolve through the
/// factory on first use. Either way, once the bean exists the handle yields
/// the same shared instance the container caches.
#[derive(Clone)]
pub struct BeanHandle {
    name: Arc<str>,
    slot: Arc<OnceLock<BeanInstance>>,
    factory: Weak<DefaultListableBeanFactory>,
}

impl BeanHandle {
    pub(crate) fn early(
        name: &str,
        slot: Arc<OnceLock<BeanInstance>>,
        factory: Weak<DefaultListableBeanFactory>,
    ) -> Self {
        BeanHandle {
            name: Arc::from(name),
            slot,
            factory,
        }
    }

    pub(crate) fn lazy(name: &str, factory: Weak<DefaultListableBeanFactory>) -> Self {
        BeanHandle {
            name: Arc::from(name),
            slot: Arc::new(OnceLock::new()),
            factory,
        }
    }

    pub fn bean_name(&self) -> &str {
        &self.name
    }

    /// Whether the handle can yield an instance without touching the factory.
    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Resolves the referenced instance, creating the bean if necessary.
    ///
    /// Dereferencing an early handle from inside the creation of its own bean
    /// reports the circular dependency instead of recursing forever.
    pub fn instance(&self) -> ContainerResult<BeanInstance> {
        if let Some(instance) = self.slot.get() {
            return Ok(instance.clone());
        }
        let factory = self
            .factory
            .upgrade()
            .ok_or_else(|| ContainerError::HandleNotReady(self.name.to_string()))?;
        let instance = factory.get_bean(&self.name)?;
        let _ = self.slot.set(instance.clone());
        Ok(instance)
    }

    /// Resolves and downcasts to the concrete bean type.
    pub fn get<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.instance()?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: self.name.to_string(),
                requested: std::any::type_name::<T>().to_string(),
            })
    }
}

impl fmt::Debug for BeanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanHandle")
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

type CastFn = Arc<dyn Fn(&BeanInstance) -> Option<BeanValue> + Send + Sync>;

/// A cached singleton with the metadata needed to serve typed lookups.
#[derive(Clone)]
pub struct RegisteredSingleton {
    pub instance: BeanInstance,
    pub type_id: Option<TypeId>,
    pub type_name: Option<String>,
    /// Upcast for manually registered singletons that bypass a bean class.
    pub cast: Option<CastFn>,
}

impl RegisteredSingleton {
    pub fn new(instance: BeanInstance) -> Self {
        RegisteredSingleton {
            instance,
            type_id: None,
            type_name: None,
            cast: None,
        }
    }
}

struct CreationEntry {
    thread: ThreadId,
    slot: Arc<OnceLock<BeanInstance>>,
    early_exposed: bool,
}

/// In-creation bookkeeping, all under one lock so cycle checks and wait
/// registration are atomic.
#[derive(Default)]
struct CreationState {
    entries: HashMap<String, CreationEntry>,
    /// thread -> name it is blocked on
    waiting: HashMap<ThreadId, String>,
}

impl CreationState {
    /// Follows the wait-for graph from `name`: the thread creating it, the
    /// name that thread is blocked on, and so forth. A path back to
    /// `current` is an unresolvable cross-thread cycle.
    fn waiting_cycle(&self, name: &str, current: ThreadId) -> Option<Vec<String>> {
        let mut chain = vec![name.to_string()];
        let mut owner = self.entries.get(name)?.thread;
        loop {
            if owner == current {
                chain.sort();
                return Some(chain);
            }
            let next = self.waiting.get(&owner)?;
            if chain.iter().any(|n| n == next) {
                // cycle entirely among other threads; one of them reports it
                return None;
            }
            chain.push(next.clone());
            owner = self.entries.get(next)?.thread;
        }
    }
}

/// Singleton cache and creation coordinator.
#[derive(Default)]
pub struct SingletonRegistry {
    singletons: RwLock<HashMap<String, RegisteredSingleton>>,
    registration_order: Mutex<Vec<String>>,
    in_creation: Mutex<CreationState>,
    creation_done: Condvar,
    /// name -> beans that depend on it
    dependents: RwLock<HashMap<String, Vec<String>>>,
    /// name -> beans it depends on
    dependencies: RwLock<HashMap<String, Vec<String>>>,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pre-built singleton. Re-registering the same instance
    /// under the same name is a no-op; a different instance is an error.
    pub fn register(&self, name: &str, singleton: RegisteredSingleton) -> ContainerResult<()> {
        let mut singletons = self.singletons.write();
        if let Some(existing) = singletons.get(name) {
            if Arc::ptr_eq(&existing.instance, &singleton.instance) {
                return Ok(());
            }
            return Err(ContainerError::DuplicateSingleton(name.to_string()));
        }
        singletons.insert(name.to_string(), singleton);
        self.registration_order.lock().push(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<BeanInstance> {
        self.singletons.read().get(name).map(|s| s.instance.clone())
    }

    pub fn lookup(&self, name: &str) -> Option<RegisteredSingleton> {
        self.singletons.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.singletons.read().contains_key(name)
    }

    /// Singleton names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.registration_order.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.singletons.read().len()
    }

    pub fn is_in_creation(&self, name: &str) -> bool {
        self.in_creation.lock().entries.contains_key(name)
    }

    /// Returns the cached singleton or runs `create` exactly once per name.
    ///
    /// Concurrent callers for the same name block until the first creation
    /// settles; a failed creation leaves no trace, so a later call retries
    /// from a clean slate. Re-entry from the creating thread itself is a
    /// circular dependency, as is a wait that would close a cycle through
    /// other blocked threads.
    pub fn get_or_create<F>(&self, name: &str, create: F) -> ContainerResult<BeanInstance>
    where
        F: FnOnce() -> ContainerResult<RegisteredSingleton>,
    {
        if let Some(instance) = self.get(name) {
            return Ok(instance);
        }
        let current = thread::current().id();
        let slot = {
            let mut in_creation = self.in_creation.lock();
            loop {
                if let Some(instance) = self.get(name) {
                    return Ok(instance);
                }
                match in_creation.entries.get(name) {
                    Some(entry) if entry.thread == current => {
                        let mut chain: Vec<String> = in_creation
                            .entries
                            .iter()
                            .filter(|(_, e)| e.thread == current)
                            .map(|(n, _)| n.clone())
                            .collect();
                        chain.sort();
                        return Err(ContainerError::CircularDependency {
                            name: name.to_string(),
                            chain,
                        });
                    }
                    Some(_) => {
                        if let Some(chain) = in_creation.waiting_cycle(name, current) {
                            return Err(ContainerError::CircularDependency {
                                name: name.to_string(),
                                chain,
                            });
                        }
                        in_creation.waiting.insert(current, name.to_string());
                        self.creation_done.wait(&mut in_creation);
                        in_creation.waiting.remove(&current);
                    }
                    None => {
                        let slot = Arc::new(OnceLock::new());
                        in_creation.entries.insert(
                            name.to_string(),
                            CreationEntry {
                                thread: current,
                                slot: Arc::clone(&slot),
                                early_exposed: false,
                            },
                        );
                        break slot;
                    }
                }
            }
        };

        let result = create();
        let mut in_creation = self.in_creation.lock();
        in_creation.entries.remove(name);
        match result {
            Ok(singleton) => {
                let instance = singleton.instance.clone();
                let _ = slot.set(instance.clone());
                self.singletons.write().insert(name.to_string(), singleton);
                self.registration_order.lock().push(name.to_string());
                self.creation_done.notify_all();
                Ok(instance)
            }
            Err(err) => {
                self.creation_done.notify_all();
                Err(err)
            }
        }
    }

    /// Marks the bean currently being created under `name` as safe to hand
    /// out early references for.
    pub fn expose_early(&self, name: &str) {
        if let Some(entry) = self.in_creation.lock().entries.get_mut(name) {
            entry.early_exposed = true;
        }
    }

    /// An early handle for a bean mid-creation on this thread, if its
    /// creation has passed the point where early exposure is allowed.
    pub fn early_handle(
        &self,
        name: &str,
        factory: Weak<DefaultListableBeanFactory>,
    ) -> Option<BeanHandle> {
        let in_creation = self.in_creation.lock();
        let entry = in_creation.entries.get(name)?;
        if entry.early_exposed && entry.thread == thread::current().id() {
            Some(BeanHandle::early(name, Arc::clone(&entry.slot), factory))
        } else {
            None
        }
    }

    /// Records that `dependent` holds a reference to `name`, so `dependent`
    /// is destroyed first.
    pub fn register_dependent(&self, name: &str, dependent: &str) {
        if name == dependent {
            return;
        }
        let mut dependents = self.dependents.write();
        let entry = dependents.entry(name.to_string()).or_default();
        if !entry.iter().any(|d| d == dependent) {
            entry.push(dependent.to_string());
        }
        drop(dependents);
        let mut dependencies = self.dependencies.write();
        let entry = dependencies.entry(dependent.to_string()).or_default();
        if !entry.iter().any(|d| d == name) {
            entry.push(name.to_string());
        }
    }

    /// Whether `dependent` transitively depends on `name`.
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let dependents = self.dependents.read();
        let mut seen = HashSet::new();
        let mut stack = vec![name];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(direct) = dependents.get(current) {
                if direct.iter().any(|d| d == dependent) {
                    return true;
                }
                stack.extend(direct.iter().map(String::as_str));
            }
        }
        false
    }

    /// Destruction order: dependents strictly before the beans they depend
    /// on. Falls back to reverse registration order if the recorded graph
    /// has a cycle.
    pub fn destruction_order(&self) -> Vec<String> {
        let names = self.names();
        let live: HashSet<&str> = names.iter().map(String::as_str).collect();
        let dependencies = self.dependencies.read();
        let edges: HashMap<String, Vec<String>> = names
            .iter()
            .map(|name| {
                let deps = dependencies
                    .get(name)
                    .map(|ds| {
                        ds.iter()
                            .filter(|d| live.contains(d.as_str()))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                (name.clone(), deps)
            })
            .collect();
        match topological_sort(&names, &edges) {
            Ok(mut order) => {
                // dependencies-first, reversed, gives dependents-first
                order.reverse();
                order
            }
            Err(cycle) => {
                warn!(?cycle, "dependency cycle among singletons, destroying in reverse registration order");
                let mut order = names;
                order.reverse();
                order
            }
        }
    }

    pub fn remove(&self, name: &str) -> Option<RegisteredSingleton> {
        let removed = self.singletons.write().remove(name);
        if removed.is_some() {
            self.registration_order.lock().retain(|n| n != name);
        }
        removed
    }

    pub fn clear(&self) {
        self.singletons.write().clear();
        self.registration_order.lock().clear();
        self.dependents.write().clear();
        self.dependencies.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(value: i32) -> BeanInstance {
        Arc::new(value)
    }

    #[test]
    fn test_register_is_idempotent_for_same_instance() {
        let registry = SingletonRegistry::new();
        let shared = instance(1);
        registry
            .register("a", RegisteredSingleton::new(shared.clone()))
            .unwrap();
        registry
            .register("a", RegisteredSingleton::new(shared))
            .unwrap();
        assert!(matches!(
            registry.register("a", RegisteredSingleton::new(instance(2))),
            Err(ContainerError::DuplicateSingleton(_))
        ));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_get_or_create_caches() {
        let registry = SingletonRegistry::new();
        let first = registry
            .get_or_create("a", || Ok(RegisteredSingleton::new(instance(7))))
            .unwrap();
        let second = registry
            .get_or_create("a", || panic!("must not create twice"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_creation_leaves_clean_slate() {
        let registry = SingletonRegistry::new();
        let err = registry.get_or_create("a", || {
            Err(ContainerError::NoSuchBeanDefinition("a".into()))
        });
        assert!(err.is_err());
        assert!(!registry.contains("a"));
        assert!(!registry.is_in_creation("a"));
        let ok = registry
            .get_or_create("a", || Ok(RegisteredSingleton::new(instance(9))))
            .unwrap();
        assert_eq!(*ok.downcast::<i32>().unwrap(), 9);
    }

    #[test]
    fn test_same_thread_reentry_is_circular() {
        let registry = SingletonRegistry::new();
        let err = registry.get_or_create("a", || {
            registry
                .get_or_create("a", || Ok(RegisteredSingleton::new(instance(1))))
                .map(RegisteredSingleton::new)
        });
        match err {
            Err(ContainerError::CircularDependency { name, chain }) => {
                assert_eq!(name, "a");
                assert_eq!(chain, vec!["a".to_string()]);
            }
            other => panic!("expected circular dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_cross_thread_cycle_is_detected() {
        let registry = Arc::new(SingletonRegistry::new());
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let spawn = |mine: &'static str, other: &'static str| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                registry.get_or_create(mine, || {
                    barrier.wait();
                    registry
                        .get_or_create(other, || Ok(RegisteredSingleton::new(instance(1))))
                        .map(RegisteredSingleton::new)
                })
            })
        };
        let t1 = spawn("a", "b");
        let t2 = spawn("b", "a");
        let first = t1.join().unwrap();
        let second = t2.join().unwrap();
        let circular = |r: &ContainerResult<BeanInstance>| {
            matches!(r, Err(ContainerError::CircularDependency { .. }))
        };
        // exactly one side reports the cycle, the other completes
        assert!(circular(&first) ^ circular(&second));
        assert!(!registry.is_in_creation("a"));
        assert!(!registry.is_in_creation("b"));
    }

    #[test]
    fn test_dependent_tracking_is_transitive() {
        let registry = SingletonRegistry::new();
        registry.register_dependent("a", "b");
        registry.register_dependent("b", "c");
        assert!(registry.is_dependent("a", "b"));
        assert!(registry.is_dependent("a", "c"));
        assert!(!registry.is_dependent("c", "a"));
    }

    #[test]
    fn test_destruction_order_puts_dependents_first() {
        let registry = SingletonRegistry::new();
        registry
            .register("a", RegisteredSingleton::new(instance(1)))
            .unwrap();
        registry
            .register("b", RegisteredSingleton::new(instance(2)))
            .unwrap();
        // b depends on a, so b must be destroyed before a
        registry.register_dependent("a", "b");
        let order = registry.destruction_order();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("b") < pos("a"));
    }
}
