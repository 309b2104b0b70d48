//! The bean factory.
//!
//! [`DefaultListableBeanFactory`] ties everything together: definitions and
//! their merge cache, the class registry, the singleton registry, the
//! post-processor pipeline, the conversion service and the dependency
//! resolver. The public surface is split across the factory traits; most
//! callers only need [`BeanFactory`] and [`ConfigurableBeanFactory`].
//!
//! Creation pipeline, in order: before-instantiation processors (may
//! short-circuit), instantiation (factory method or greediest satisfiable
//! constructor), early singleton exposure, after-instantiation processors,
//! property processing and population, before-initialization processors,
//! init callback, after-initialization processors. The instance returned by
//! the last stage is what gets cached and injected.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::bean::{
    AutowireMode, BeanDefinition, BeanDefinitionHolder, DependencyCheck, MergedBeanDefinition,
    PropertyValues, ValueHolder, ValueSource,
};
use crate::class::{ArgList, BeanClass, BeanObject, ClassRegistry, ConstructorSpec, ParamSpec};
use crate::convert::{ConversionService, Converter, DefaultConversionService, TypeDescriptor};
use crate::error::{ContainerError, ContainerResult};
use crate::processor::{BeanPostProcessor, PropertyDecision};
use crate::resolver::{
    order_candidates, select_candidate, Candidate, DependencyDescriptor, DependencyShape,
};
use crate::scope::{BeanScope, ScopeStrategy};
use crate::singleton::{BeanHandle, RegisteredSingleton, SingletonRegistry};
use crate::utils::naming;
use crate::value::{BeanInstance, BeanValue};

/// Core bean access.
pub trait BeanFactory: Send + Sync {
    /// Returns the bean registered or defined under `name`, creating it
    /// according to its scope.
    fn get_bean(&self, name: &str) -> ContainerResult<BeanInstance>;

    /// Whether a bean (definition or singleton) exists under `name`.
    fn contains_bean(&self, name: &str) -> bool;

    fn is_singleton(&self, name: &str) -> ContainerResult<bool>;

    fn is_prototype(&self, name: &str) -> ContainerResult<bool>;
}

/// Typed convenience accessors.
pub trait BeanFactoryExt: BeanFactory {
    fn get_bean_as<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>>;

    /// Resolves the unique bean of type `T`, applying primary/order
    /// disambiguation.
    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>>;

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool;
}

/// Enumeration over the registered definitions.
pub trait ListableBeanFactory: BeanFactory {
    /// Definition names in registration order.
    fn bean_definition_names(&self) -> Vec<String>;

    /// Names of autowire candidates providing `type_id`, in definition order.
    fn bean_names_for_type(&self, type_id: TypeId) -> Vec<String>;

    fn bean_definition_count(&self) -> usize;
}

/// Configuration surface: definitions, processors, aliases, scopes.
pub trait ConfigurableBeanFactory: BeanFactory {
    fn register_bean_definition(
        &self,
        name: &str,
        definition: BeanDefinition,
    ) -> ContainerResult<()>;

    fn contains_bean_definition(&self, name: &str) -> bool;

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()>;

    /// A snapshot of the definition registered under `name`.
    fn bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition>;

    fn modify_bean_definition<F>(&self, name: &str, modifier: F) -> ContainerResult<()>
    where
        F: FnOnce(&mut BeanDefinition);

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()>;

    fn register_scope(&self, name: &str, strategy: Arc<dyn ScopeStrategy>);
}

/// Full container lifecycle control.
pub trait ConfigurableListableBeanFactory: ListableBeanFactory + ConfigurableBeanFactory {
    /// Eagerly creates every non-lazy singleton, in definition order.
    fn pre_instantiate_singletons(&self) -> ContainerResult<()>;

    /// Disallows further definition changes and enables aggressive metadata
    /// caching.
    fn freeze_configuration(&self);

    fn is_configuration_frozen(&self) -> bool;

    /// Destroys all cached singletons, dependents before their dependencies.
    /// Per-bean destruction failures are logged, never propagated.
    fn destroy_singletons(&self);
}

/// Outcome of one constructor satisfaction attempt.
struct Satisfaction {
    args: Vec<BeanValue>,
    explicit: usize,
    arity: usize,
    dependents: Vec<String>,
}

struct PrototypeGuard<'a> {
    factory: &'a DefaultListableBeanFactory,
    key: (ThreadId, String),
}

impl Drop for PrototypeGuard<'_> {
    fn drop(&mut self) {
        self.factory.prototypes_in_creation.lock().remove(&self.key);
    }
}

/// The default, fully featured bean factory.
pub struct DefaultListableBeanFactory {
    self_ref: Weak<DefaultListableBeanFactory>,
    parent: Option<Arc<DefaultListableBeanFactory>>,
    classes: ClassRegistry,
    definitions: RwLock<HashMap<String, BeanDefinition>>,
    definition_order: RwLock<Vec<String>>,
    aliases: RwLock<HashMap<String, String>>,
    merged: RwLock<HashMap<String, Arc<MergedBeanDefinition>>>,
    singletons: SingletonRegistry,
    processors: RwLock<Vec<Arc<dyn BeanPostProcessor>>>,
    conversion: RwLock<DefaultConversionService>,
    /// Injection values served directly by type, bypassing candidate search.
    resolvable: RwLock<HashMap<TypeId, BeanValue>>,
    ignored_types: RwLock<HashSet<TypeId>>,
    scopes: RwLock<HashMap<String, Arc<dyn ScopeStrategy>>>,
    frozen: AtomicBool,
    cache_metadata: AtomicBool,
    allow_circular: AtomicBool,
    prototypes_in_creation: Mutex<HashSet<(ThreadId, String)>>,
}

impl DefaultListableBeanFactory {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self::with_self_ref(weak.clone(), None))
    }

    /// A factory that falls back to `parent` for beans it does not define.
    pub fn with_parent(parent: Arc<DefaultListableBeanFactory>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self::with_self_ref(weak.clone(), Some(parent)))
    }

    fn with_self_ref(
        self_ref: Weak<DefaultListableBeanFactory>,
        parent: Option<Arc<DefaultListableBeanFactory>>,
    ) -> Self {
        DefaultListableBeanFactory {
            self_ref,
            parent,
            classes: ClassRegistry::new(),
            definitions: RwLock::new(HashMap::new()),
            definition_order: RwLock::new(Vec::new()),
            aliases: RwLock::new(HashMap::new()),
            merged: RwLock::new(HashMap::new()),
            singletons: SingletonRegistry::new(),
            processors: RwLock::new(Vec::new()),
            conversion: RwLock::new(DefaultConversionService::new()),
            resolvable: RwLock::new(HashMap::new()),
            ignored_types: RwLock::new(HashSet::new()),
            scopes: RwLock::new(HashMap::new()),
            frozen: AtomicBool::new(false),
            cache_metadata: AtomicBool::new(true),
            allow_circular: AtomicBool::new(true),
            prototypes_in_creation: Mutex::new(HashSet::new()),
        }
    }

    pub fn parent(&self) -> Option<&Arc<DefaultListableBeanFactory>> {
        self.parent.as_ref()
    }

    pub fn register_bean_class(&self, class: Arc<BeanClass>) {
        self.classes.register(class);
    }

    /// Registers a definition together with its aliases in one step.
    pub fn register_bean_definition_holder(
        &self,
        holder: BeanDefinitionHolder,
    ) -> ContainerResult<()> {
        self.register_bean_definition(&holder.name, holder.definition)?;
        for alias in &holder.aliases {
            self.register_alias(&holder.name, alias)?;
        }
        Ok(())
    }

    /// Registers a ready-made instance under `name`, outside the definition
    /// lifecycle: no population, no init callbacks, no destroy method.
    pub fn register_singleton<T: Send + Sync + 'static>(
        &self,
        name: &str,
        instance: Arc<T>,
    ) -> ContainerResult<()> {
        let cast: Arc<dyn Fn(&BeanInstance) -> Option<BeanValue> + Send + Sync> =
            Arc::new(|instance: &BeanInstance| {
                Arc::clone(instance)
                    .downcast::<T>()
                    .ok()
                    .map(BeanValue::wrap_shared)
            });
        let instance: BeanInstance = instance;
        self.singletons.register(
            name,
            RegisteredSingleton {
                instance,
                type_id: Some(TypeId::of::<T>()),
                type_name: Some(std::any::type_name::<T>().to_string()),
                cast: Some(cast),
            },
        )
    }

    /// Serves `value` for every injection point of type `T` without any
    /// candidate search. `T` is typically a trait object.
    pub fn register_resolvable_dependency<T: ?Sized + Send + Sync + 'static>(
        &self,
        value: Arc<T>,
    ) {
        self.resolvable
            .write()
            .insert(TypeId::of::<T>(), BeanValue::wrap_shared(value));
    }

    /// Excludes `T` from by-type property autowiring.
    pub fn ignore_dependency_type<T: ?Sized + 'static>(&self) {
        self.ignored_types.write().insert(TypeId::of::<T>());
    }

    pub fn add_converter(&self, converter: Arc<dyn Converter>) {
        self.conversion.write().add_converter(converter);
    }

    /// Disables early singleton exposure; every reference cycle then fails.
    pub fn set_allow_circular_references(&self, allow: bool) {
        self.allow_circular.store(allow, Ordering::SeqCst);
    }

    pub fn set_cache_bean_metadata(&self, cache: bool) {
        self.cache_metadata.store(cache, Ordering::SeqCst);
        if !cache {
            self.merged.write().clear();
        }
    }

    /// The number of cached singletons.
    pub fn singleton_count(&self) -> usize {
        self.singletons.count()
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains(&self.canonical_name(name))
    }

    /// Creates a fully configured, uncached instance of `class` with
    /// autodetected autowiring.
    pub fn create_bean(&self, class: &Arc<BeanClass>) -> ContainerResult<BeanInstance> {
        self.create_bean_with(class, AutowireMode::Autodetect, DependencyCheck::None)
    }

    /// Creates a fully configured, uncached instance of `class` with the
    /// given autowiring mode and dependency check.
    pub fn create_bean_with(
        &self,
        class: &Arc<BeanClass>,
        autowire: AutowireMode,
        check: DependencyCheck,
    ) -> ContainerResult<BeanInstance> {
        self.classes.register(Arc::clone(class));
        let mut merged = MergedBeanDefinition::empty(naming::default_bean_name(class.type_name()));
        merged.type_id = Some(BeanClass::type_id(class));
        merged.class_name = Some(class.type_name().to_string());
        merged.scope = BeanScope::Prototype;
        merged.autowire = autowire;
        merged.dependency_check = check;
        let _guard = self.begin_prototype_creation(&merged.name)?;
        self.create_bean_internal(&merged)
    }

    /// Autowires the properties of an existing instance. The instance's type
    /// must have a registered bean class.
    pub fn autowire_bean_properties(
        &self,
        bean: &mut dyn Any,
        autowire: AutowireMode,
        check: DependencyCheck,
    ) -> ContainerResult<()> {
        // Deref first so this is `Any::type_id` of the pointee, not of the
        // `&mut dyn Any` reference itself.
        let type_id = (*bean).type_id();
        let class = self.classes.by_id(type_id).ok_or_else(|| {
            ContainerError::NoSuchBeanClass("<unregistered instance type>".to_string())
        })?;
        let mut merged = MergedBeanDefinition::empty(naming::default_bean_name(class.type_name()));
        merged.type_id = Some(type_id);
        merged.class_name = Some(class.type_name().to_string());
        merged.scope = BeanScope::Prototype;
        merged.autowire = autowire;
        merged.dependency_check = check;
        self.populate_bean(&merged, &class, bean)
    }

    /// Applies the named definition's property values and initialization
    /// chain to an externally constructed object.
    pub fn configure_bean(&self, mut bean: BeanObject, name: &str) -> ContainerResult<BeanInstance> {
        let canonical = self.canonical_name(name);
        let merged = self.merged_definition(&canonical)?;
        let class = self.class_for(&merged)?;
        self.populate_bean(&merged, &class, bean.as_mut())?;
        let instance: BeanInstance = Arc::from(bean);
        self.initialize(instance, &merged, &class)
    }

    // ------------------------------------------------------------------
    // name and metadata resolution
    // ------------------------------------------------------------------

    /// Follows alias links to the definition name.
    fn canonical_name(&self, name: &str) -> String {
        let aliases = self.aliases.read();
        let mut current = name;
        let mut seen = HashSet::new();
        while let Some(target) = aliases.get(current) {
            if !seen.insert(current) {
                break;
            }
            current = target;
        }
        current.to_string()
    }

    /// The merged (parent-chain-folded) definition for a registered name.
    pub fn merged_definition(&self, name: &str) -> ContainerResult<Arc<MergedBeanDefinition>> {
        let caching = self.cache_metadata.load(Ordering::SeqCst);
        if caching {
            if let Some(merged) = self.merged.read().get(name) {
                return Ok(Arc::clone(merged));
            }
        }
        let definition = self
            .definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::NoSuchBeanDefinition(name.to_string()))?;
        let merged = Arc::new(self.merge_chain(name, &definition)?);
        if caching {
            self.merged
                .write()
                .insert(name.to_string(), Arc::clone(&merged));
        }
        Ok(merged)
    }

    fn merge_chain(
        &self,
        name: &str,
        definition: &BeanDefinition,
    ) -> ContainerResult<MergedBeanDefinition> {
        let mut chain = vec![definition.clone()];
        let mut parent = definition.parent.clone();
        let mut seen: HashSet<String> = HashSet::new();
        {
            let definitions = self.definitions.read();
            while let Some(parent_name) = parent {
                if !seen.insert(parent_name.clone()) {
                    return Err(ContainerError::DefinitionStore {
                        name: name.to_string(),
                        message: format!("parent cycle through '{parent_name}'"),
                    });
                }
                let parent_def = definitions.get(&parent_name).ok_or_else(|| {
                    ContainerError::DefinitionStore {
                        name: name.to_string(),
                        message: format!("parent definition '{parent_name}' not found"),
                    }
                })?;
                chain.push(parent_def.clone());
                parent = parent_def.parent.clone();
            }
        }
        let mut merged = MergedBeanDefinition::empty(name);
        for definition in chain.iter().rev() {
            merged.apply(definition);
        }
        Ok(merged)
    }

    fn class_for(&self, merged: &MergedBeanDefinition) -> ContainerResult<Arc<BeanClass>> {
        if let Some(type_id) = merged.type_id {
            if let Some(class) = self.classes.by_id(type_id) {
                return Ok(class);
            }
        }
        if let Some(class_name) = &merged.class_name {
            if let Some(class) = self.classes.by_name(class_name) {
                return Ok(class);
            }
        }
        if let Some(parent) = &self.parent {
            return parent.class_for(merged);
        }
        Err(ContainerError::NoSuchBeanClass(
            merged
                .class_name
                .clone()
                .unwrap_or_else(|| merged.name.clone()),
        ))
    }

    fn class_of_bean(&self, canonical: &str) -> Option<Arc<BeanClass>> {
        if self.definitions.read().contains_key(canonical) {
            let merged = self.merged_definition(canonical).ok()?;
            self.class_for(&merged).ok()
        } else if let Some(parent) = &self.parent {
            parent.class_of_bean(canonical)
        } else {
            None
        }
    }

    fn processors(&self) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.processors.read().clone()
    }

    fn ensure_mutable(&self) -> ContainerResult<()> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(ContainerError::FrozenConfiguration);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // creation pipeline
    // ------------------------------------------------------------------

    fn begin_prototype_creation(&self, name: &str) -> ContainerResult<PrototypeGuard<'_>> {
        let key = (thread::current().id(), name.to_string());
        let mut in_creation = self.prototypes_in_creation.lock();
        if in_creation.contains(&key) {
            let mut chain: Vec<String> = in_creation
                .iter()
                .filter(|(thread, _)| *thread == key.0)
                .map(|(_, n)| n.clone())
                .collect();
            chain.sort();
            return Err(ContainerError::CircularDependency {
                name: name.to_string(),
                chain,
            });
        }
        in_creation.insert(key.clone());
        Ok(PrototypeGuard { factory: self, key })
    }

    fn create_bean_internal(
        &self,
        merged: &MergedBeanDefinition,
    ) -> ContainerResult<BeanInstance> {
        let class = self.class_for(merged)?;
        debug!(bean = %merged.name, class = class.type_name(), "creating bean");

        for processor in self.processors() {
            if let Some(replacement) = processor.before_instantiation(&class, &merged.name)? {
                debug!(
                    bean = %merged.name,
                    processor = processor.processor_name(),
                    "instantiation short-circuited"
                );
                let mut instance = replacement;
                for processor in self.processors() {
                    instance = processor.after_initialization(instance, &merged.name)?;
                }
                return Ok(instance);
            }
        }

        let mut object = self.instantiate(merged, &class)?;

        if merged.scope.is_singleton() && self.allow_circular.load(Ordering::SeqCst) {
            self.singletons.expose_early(&merged.name);
        }

        let mut populate = true;
        for processor in self.processors() {
            if !processor.after_instantiation(object.as_mut(), &merged.name)? {
                populate = false;
                break;
            }
        }
        if populate {
            self.populate_bean(merged, &class, object.as_mut())?;
        }

        let instance: BeanInstance = Arc::from(object);
        self.initialize(instance, merged, &class)
    }

    fn initialize(
        &self,
        mut instance: BeanInstance,
        merged: &MergedBeanDefinition,
        class: &Arc<BeanClass>,
    ) -> ContainerResult<BeanInstance> {
        for processor in self.processors() {
            instance = processor.before_initialization(instance, &merged.name)?;
        }
        if let Some(init) = &merged.init_method {
            match Arc::get_mut(&mut instance) {
                Some(object) => class.invoke_method(object, init)?,
                None => warn!(
                    bean = %merged.name,
                    method = %init,
                    "init method skipped, instance is already shared"
                ),
            }
        }
        for processor in self.processors() {
            instance = processor.after_initialization(instance, &merged.name)?;
        }
        Ok(instance)
    }

    fn instantiate(
        &self,
        merged: &MergedBeanDefinition,
        class: &Arc<BeanClass>,
    ) -> ContainerResult<BeanObject> {
        if let Some(method_name) = &merged.factory_method {
            return self.instantiate_via_factory_method(merged, class, method_name);
        }

        let autowire = merged.effective_autowire(class.has_nondefault_constructor());
        let constructor_autowire = autowire == AutowireMode::Constructor;

        if merged.constructor_args.is_empty() && !constructor_autowire {
            if let Some(ctor) = class.default_constructor() {
                return ctor.instantiate(ArgList::new(Vec::new()));
            }
        }
        self.instantiate_via_constructor(merged, class, constructor_autowire)
    }

    fn instantiate_via_factory_method(
        &self,
        merged: &MergedBeanDefinition,
        class: &Arc<BeanClass>,
        method_name: &str,
    ) -> ContainerResult<BeanObject> {
        let (spec_class, factory_instance) = match &merged.factory_bean {
            Some(factory_name) => {
                let instance = self.get_bean(factory_name)?;
                self.singletons.register_dependent(factory_name, &merged.name);
                let spec_class = self.class_of_bean(&self.canonical_name(factory_name)).ok_or_else(
                    || ContainerError::NoSuchBeanClass(factory_name.clone()),
                )?;
                (spec_class, Some(instance))
            }
            None => (Arc::clone(class), None),
        };
        let spec = spec_class.factory_method(method_name).ok_or_else(|| {
            ContainerError::UnknownMethod {
                type_name: spec_class.type_name().to_string(),
                method: method_name.to_string(),
            }
        })?;

        let mut dependents = Vec::new();
        let args = self
            .satisfy_params(merged, &spec.params, true, &mut dependents)?
            .ok_or_else(|| ContainerError::NoSatisfiableConstructor {
                name: merged.name.clone(),
                type_name: format!("{}::{}", spec_class.type_name(), method_name),
            })?;
        for dependent in dependents {
            self.singletons.register_dependent(&dependent, &merged.name);
        }

        match factory_instance {
            Some(instance) => spec.invoke_on(instance.as_ref(), ArgList::new(args)),
            None => spec.invoke_static(ArgList::new(args)),
        }
    }

    /// Greediest-constructor resolution: every satisfiable constructor is
    /// considered, the one with the most parameters wins; among equals, the
    /// one satisfying more parameters from explicit argument values wins.
    /// A remaining tie is ambiguous.
    fn instantiate_via_constructor(
        &self,
        merged: &MergedBeanDefinition,
        class: &Arc<BeanClass>,
        autowire: bool,
    ) -> ContainerResult<BeanObject> {
        let mut satisfied: Vec<(&ConstructorSpec, Satisfaction)> = Vec::new();
        for ctor in class.constructors() {
            let mut dependents = Vec::new();
            if let Some(args) =
                self.satisfy_params(merged, &ctor.params, autowire, &mut dependents)?
            {
                let explicit = self.explicit_param_count(merged, &ctor.params);
                satisfied.push((
                    ctor,
                    Satisfaction {
                        args,
                        explicit,
                        arity: ctor.arity(),
                        dependents,
                    },
                ));
            }
        }

        let Some(max_arity) = satisfied.iter().map(|(_, s)| s.arity).max() else {
            return Err(ContainerError::NoSatisfiableConstructor {
                name: merged.name.clone(),
                type_name: class.type_name().to_string(),
            });
        };
        satisfied.retain(|(_, s)| s.arity == max_arity);
        if satisfied.len() > 1 {
            let max_explicit = satisfied.iter().map(|(_, s)| s.explicit).max().unwrap_or(0);
            satisfied.retain(|(_, s)| s.explicit == max_explicit);
        }
        if satisfied.len() > 1 {
            return Err(ContainerError::AmbiguousConstructor {
                name: merged.name.clone(),
                params: max_arity,
                count: satisfied.len(),
            });
        }
        let (ctor, satisfaction) = satisfied.remove(0);
        for dependent in satisfaction.dependents {
            self.singletons.register_dependent(&dependent, &merged.name);
        }
        ctor.instantiate(ArgList::new(satisfaction.args))
    }

    /// Tries to produce a full argument list for `params`.
    ///
    /// `Ok(None)` means unsatisfiable (a missing or ambiguous autowire
    /// candidate); hard failures such as conversion errors and circular
    /// dependencies propagate.
    fn satisfy_params(
        &self,
        merged: &MergedBeanDefinition,
        params: &[ParamSpec],
        autowire: bool,
        dependents: &mut Vec<String>,
    ) -> ContainerResult<Option<Vec<BeanValue>>> {
        let mut args = Vec::with_capacity(params.len());
        let mut used_generic: HashSet<usize> = HashSet::new();
        for (index, param) in params.iter().enumerate() {
            let holder = merged.constructor_args.indexed(index).or_else(|| {
                merged
                    .constructor_args
                    .generic_for(&param.name, &param.descriptor, &used_generic)
                    .map(|(i, holder)| {
                        used_generic.insert(i);
                        holder
                    })
            });
            if let Some(holder) = holder {
                args.push(self.resolve_holder(holder, &param.descriptor, merged, dependents)?);
                continue;
            }
            if autowire {
                let descriptor = DependencyDescriptor::from_descriptor(&param.descriptor)
                    .for_bean(merged.name.clone());
                let descriptor = if param.required {
                    descriptor
                } else {
                    descriptor.optional()
                };
                match self.resolve_dependency(&descriptor, dependents) {
                    Ok(Some(value)) => {
                        args.push(value);
                        continue;
                    }
                    Ok(None) if !param.required => {
                        args.push(BeanValue::Null);
                        continue;
                    }
                    Ok(None) => return Ok(None),
                    Err(
                        ContainerError::NoMatchingBean { .. }
                        | ContainerError::AmbiguousDependency { .. },
                    ) => return Ok(None),
                    Err(other) => return Err(other),
                }
            }
            if !param.required {
                args.push(BeanValue::Null);
                continue;
            }
            return Ok(None);
        }
        Ok(Some(args))
    }

    fn explicit_param_count(&self, merged: &MergedBeanDefinition, params: &[ParamSpec]) -> usize {
        let mut used_generic: HashSet<usize> = HashSet::new();
        let mut explicit = 0;
        for (index, param) in params.iter().enumerate() {
            if merged.constructor_args.indexed(index).is_some() {
                explicit += 1;
            } else if let Some((i, _)) =
                merged
                    .constructor_args
                    .generic_for(&param.name, &param.descriptor, &used_generic)
            {
                used_generic.insert(i);
                explicit += 1;
            }
        }
        explicit
    }

    // ------------------------------------------------------------------
    // property population
    // ------------------------------------------------------------------

    fn populate_bean(
        &self,
        merged: &MergedBeanDefinition,
        class: &Arc<BeanClass>,
        object: &mut dyn Any,
    ) -> ContainerResult<()> {
        let autowire = merged.effective_autowire(class.has_nondefault_constructor());
        let mut values = merged.property_values.clone();
        let mut dependents: Vec<String> = Vec::new();

        if matches!(autowire, AutowireMode::ByName | AutowireMode::ByType) {
            self.autowire_properties(merged, class, autowire, &mut values, &mut dependents)?;
        }

        for processor in self.processors() {
            match processor.process_properties(values, object, &merged.name)? {
                PropertyDecision::Proceed(rewritten) => values = rewritten,
                PropertyDecision::SkipApply => {
                    debug!(
                        bean = %merged.name,
                        processor = processor.processor_name(),
                        "property application skipped"
                    );
                    return Ok(());
                }
            }
        }

        for pv in values.iter() {
            let prop = class.property(&pv.name).ok_or_else(|| {
                ContainerError::UnknownProperty {
                    type_name: class.type_name().to_string(),
                    property: pv.name.clone(),
                }
            })?;
            let target = if prop.lazy {
                TypeDescriptor::of::<BeanHandle>()
            } else {
                prop.descriptor.clone()
            };
            let value = self.resolve_holder(&pv.holder, &target, merged, &mut dependents)?;
            prop.apply(object, value)?;
        }

        for dependent in dependents {
            self.singletons.register_dependent(&dependent, &merged.name);
        }

        self.check_dependencies(merged, class, &values)
    }

    fn autowire_properties(
        &self,
        merged: &MergedBeanDefinition,
        class: &Arc<BeanClass>,
        autowire: AutowireMode,
        values: &mut PropertyValues,
        dependents: &mut Vec<String>,
    ) -> ContainerResult<()> {
        let ignored = self.ignored_types.read().clone();
        for prop in class.properties() {
            if values.contains(&prop.name) || ignored.contains(&prop.descriptor.id()) {
                continue;
            }
            match autowire {
                AutowireMode::ByName => {
                    if self.contains_bean(&prop.name) {
                        debug!(bean = %merged.name, property = %prop.name, "autowiring by name");
                        values.add(prop.name.clone(), ValueHolder::reference(prop.name.clone()));
                    }
                }
                AutowireMode::ByType => {
                    let descriptor = DependencyDescriptor::from_descriptor(&prop.descriptor)
                        .for_bean(merged.name.clone());
                    let descriptor = if prop.required {
                        descriptor
                    } else {
                        descriptor.optional()
                    };
                    let descriptor = if prop.lazy {
                        descriptor.lazy()
                    } else {
                        descriptor
                    };
                    if let Some(value) = self.resolve_dependency(&descriptor, dependents)? {
                        debug!(bean = %merged.name, property = %prop.name, "autowiring by type");
                        values.add(prop.name.clone(), ValueHolder::of(value));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_dependencies(
        &self,
        merged: &MergedBeanDefinition,
        class: &Arc<BeanClass>,
        applied: &PropertyValues,
    ) -> ContainerResult<()> {
        for prop in class.properties() {
            if applied.contains(&prop.name) {
                continue;
            }
            let checked = match merged.dependency_check {
                DependencyCheck::None => false,
                DependencyCheck::All => true,
                DependencyCheck::Simple => is_simple_type(&prop.descriptor),
                DependencyCheck::References => !is_simple_type(&prop.descriptor),
            };
            if checked || prop.required {
                return Err(ContainerError::UnsatisfiedDependency {
                    name: merged.name.clone(),
                    property: prop.name.clone(),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // value and dependency resolution
    // ------------------------------------------------------------------

    /// Resolves a declared value holder against a target type. Converted
    /// literals are cached in the holder, so prototypes re-use the result.
    fn resolve_holder(
        &self,
        holder: &ValueHolder,
        target: &TypeDescriptor,
        merged: &MergedBeanDefinition,
        dependents: &mut Vec<String>,
    ) -> ContainerResult<BeanValue> {
        match &holder.source {
            ValueSource::Value(value) => {
                if let Some(cached) = holder.cached() {
                    return Ok(cached.clone());
                }
                let target = holder.descriptor.as_ref().unwrap_or(target);
                let converted = self
                    .conversion
                    .read()
                    .convert_value(value.clone(), target)?;
                Ok(holder.cache(converted).clone())
            }
            ValueSource::Ref(reference) => {
                if reference.to_parent {
                    let parent = self.parent.as_ref().ok_or_else(|| {
                        ContainerError::NoSuchBeanDefinition(reference.target.clone())
                    })?;
                    return parent.bean_value_by_name(&reference.target, target);
                }
                dependents.push(reference.target.clone());
                self.bean_value_by_name(&reference.target, target)
            }
            ValueSource::NestedBean(definition) => {
                let inner_name = format!("(inner bean of '{}')", merged.name);
                let inner = self.merge_chain(&inner_name, definition)?;
                let instance = self.create_bean_internal(&inner)?;
                let class = self.class_for(&inner)?;
                let type_id = if target.is_dynamic() {
                    BeanClass::type_id(&class)
                } else {
                    target.id()
                };
                class
                    .cast_to(&instance, type_id)
                    .ok_or_else(|| ContainerError::TypeMismatch {
                        name: inner_name,
                        requested: target.name().to_string(),
                    })
            }
        }
    }

    /// Resolves a by-name reference into an injectable value of the target
    /// type. A target of [`BeanHandle`] yields a deferred handle, which is
    /// how reference cycles through non-constructor injection resolve.
    fn bean_value_by_name(
        &self,
        name: &str,
        target: &TypeDescriptor,
    ) -> ContainerResult<BeanValue> {
        let canonical = self.canonical_name(name);
        if target.id() == TypeId::of::<BeanHandle>() {
            if let Some(handle) = self.singletons.early_handle(&canonical, self.self_ref.clone()) {
                debug!(bean = %canonical, "handing out early reference");
                return Ok(BeanValue::Handle(handle));
            }
            return Ok(BeanValue::Handle(BeanHandle::lazy(
                &canonical,
                self.self_ref.clone(),
            )));
        }
        let instance = self.get_bean(&canonical)?;
        self.value_of_instance(&canonical, &instance, target)
    }

    fn value_of_instance(
        &self,
        canonical: &str,
        instance: &BeanInstance,
        target: &TypeDescriptor,
    ) -> ContainerResult<BeanValue> {
        if let Some(class) = self.class_of_bean(canonical) {
            let type_id = if target.is_dynamic() {
                BeanClass::type_id(&class)
            } else {
                target.id()
            };
            if let Some(value) = class.cast_to(instance, type_id) {
                return Ok(value);
            }
        } else if let Some(registered) = self.singletons.lookup(canonical) {
            if let Some(cast) = &registered.cast {
                if target.is_dynamic() || registered.type_id == Some(target.id()) {
                    if let Some(value) = cast(instance) {
                        return Ok(value);
                    }
                }
            }
        }
        Err(ContainerError::TypeMismatch {
            name: canonical.to_string(),
            requested: target.name().to_string(),
        })
    }

    /// Resolves an injection point by type.
    ///
    /// `Ok(None)` only occurs for non-required dependencies with no
    /// candidates; collection shapes yield empty collections instead.
    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        dependents: &mut Vec<String>,
    ) -> ContainerResult<Option<BeanValue>> {
        let element = descriptor.element_type();
        match &descriptor.shape {
            DependencyShape::Single(target) => {
                if let Some(value) = self.resolvable.read().get(&target.id()) {
                    return Ok(Some(value.clone()));
                }
                let candidates =
                    self.candidates_for(target.id(), descriptor.containing_bean.as_deref());
                if candidates.is_empty() {
                    if descriptor.required {
                        return Err(ContainerError::NoMatchingBean {
                            requester: descriptor.requester().to_string(),
                            type_name: target.name().to_string(),
                        });
                    }
                    return Ok(None);
                }
                let picked = select_candidate(descriptor, &candidates)?;
                dependents.push(picked.name.clone());
                if descriptor.lazy {
                    return Ok(Some(BeanValue::Handle(BeanHandle::lazy(
                        &picked.name,
                        self.self_ref.clone(),
                    ))));
                }
                Ok(Some(self.bean_value_by_name(&picked.name, target)?))
            }
            DependencyShape::List(_) => {
                let mut candidates =
                    self.candidates_for(element.id(), descriptor.containing_bean.as_deref());
                if candidates.is_empty() && descriptor.required {
                    return Err(ContainerError::NoMatchingBean {
                        requester: descriptor.requester().to_string(),
                        type_name: element.name().to_string(),
                    });
                }
                order_candidates(&mut candidates);
                let mut items = Vec::with_capacity(candidates.len());
                for candidate in &candidates {
                    dependents.push(candidate.name.clone());
                    items.push(self.bean_value_by_name(&candidate.name, element)?);
                }
                Ok(Some(BeanValue::List(items)))
            }
            DependencyShape::Map(_) => {
                let candidates =
                    self.candidates_for(element.id(), descriptor.containing_bean.as_deref());
                if candidates.is_empty() && descriptor.required {
                    return Err(ContainerError::NoMatchingBean {
                        requester: descriptor.requester().to_string(),
                        type_name: element.name().to_string(),
                    });
                }
                let mut entries = BTreeMap::new();
                for candidate in &candidates {
                    dependents.push(candidate.name.clone());
                    entries.insert(
                        candidate.name.clone(),
                        self.bean_value_by_name(&candidate.name, element)?,
                    );
                }
                Ok(Some(BeanValue::Map(entries)))
            }
        }
    }

    /// Autowire candidates providing `type_id`, in definition order, plus
    /// manually registered singletons of that exact type. Falls back to the
    /// parent factory when nothing matches locally.
    fn candidates_for(&self, type_id: TypeId, excluded: Option<&str>) -> Vec<Candidate> {
        let order = self.definition_order.read().clone();
        let mut out: Vec<Candidate> = Vec::new();
        for name in &order {
            if excluded == Some(name.as_str()) {
                continue;
            }
            let Ok(merged) = self.merged_definition(name) else {
                continue;
            };
            if merged.abstract_definition || !merged.autowire_candidate {
                continue;
            }
            let Ok(class) = self.class_for(&merged) else {
                continue;
            };
            if class.provides_type(type_id) {
                out.push(Candidate {
                    name: name.clone(),
                    primary: merged.primary,
                    order: merged.order,
                });
            }
        }
        let definitions = self.definitions.read();
        for name in self.singletons.names() {
            if excluded == Some(name.as_str()) || definitions.contains_key(&name) {
                continue;
            }
            if let Some(registered) = self.singletons.lookup(&name) {
                if registered.type_id == Some(type_id) {
                    out.push(Candidate {
                        name,
                        primary: false,
                        order: None,
                    });
                }
            }
        }
        drop(definitions);
        if out.is_empty() {
            if let Some(parent) = &self.parent {
                return parent.candidates_for(type_id, excluded);
            }
        }
        out
    }

    fn destroy_singleton(&self, name: &str, processors: &[Arc<dyn BeanPostProcessor>]) {
        let Some(registered) = self.singletons.remove(name) else {
            return;
        };
        debug!(bean = %name, "destroying singleton");
        for processor in processors {
            if processor.requires_destruction(&registered.instance, name) {
                if let Err(err) = processor.before_destruction(&registered.instance, name) {
                    warn!(bean = %name, error = %err, "destruction callback failed");
                }
            }
        }
        let Ok(merged) = self.merged_definition(name) else {
            return;
        };
        if let Some(destroy) = &merged.destroy_method {
            let Ok(class) = self.class_for(&merged) else {
                return;
            };
            let mut instance = registered.instance;
            match Arc::get_mut(&mut instance) {
                Some(object) => {
                    if let Err(err) = class.invoke_method(object, destroy) {
                        warn!(bean = %name, method = %destroy, error = %err, "destroy method failed");
                    }
                }
                None => warn!(
                    bean = %name,
                    method = %destroy,
                    "destroy method skipped, instance is still shared"
                ),
            }
        }
    }
}

fn is_simple_type(descriptor: &TypeDescriptor) -> bool {
    const SIMPLE: &[fn() -> TypeId] = &[
        TypeId::of::<bool>,
        TypeId::of::<char>,
        TypeId::of::<i8>,
        TypeId::of::<i16>,
        TypeId::of::<i32>,
        TypeId::of::<i64>,
        TypeId::of::<isize>,
        TypeId::of::<u8>,
        TypeId::of::<u16>,
        TypeId::of::<u32>,
        TypeId::of::<u64>,
        TypeId::of::<usize>,
        TypeId::of::<f32>,
        TypeId::of::<f64>,
        TypeId::of::<String>,
        TypeId::of::<PathBuf>,
    ];
    SIMPLE.iter().any(|f| f() == descriptor.id())
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<BeanInstance> {
        let canonical = self.canonical_name(name);
        if let Some(instance) = self.singletons.get(&canonical) {
            return Ok(instance);
        }
        if !self.definitions.read().contains_key(&canonical) {
            if let Some(parent) = &self.parent {
                return parent.get_bean(&canonical);
            }
            return Err(ContainerError::NoSuchBeanDefinition(canonical));
        }
        let merged = self.merged_definition(&canonical)?;
        if merged.abstract_definition {
            return Err(ContainerError::AbstractDefinition(canonical));
        }

        for dependency in &merged.depends_on {
            if self.singletons.is_dependent(&canonical, dependency) {
                return Err(ContainerError::CircularDependency {
                    name: canonical.clone(),
                    chain: vec![dependency.clone(), canonical.clone()],
                });
            }
            self.singletons.register_dependent(dependency, &canonical);
            self.get_bean(dependency)?;
        }

        match merged.scope.clone() {
            BeanScope::Singleton => self.singletons.get_or_create(&canonical, || {
                let instance = self.create_bean_internal(&merged)?;
                Ok(RegisteredSingleton {
                    instance,
                    type_id: merged.type_id,
                    type_name: merged.class_name.clone(),
                    cast: None,
                })
            }),
            BeanScope::Prototype => {
                let _guard = self.begin_prototype_creation(&canonical)?;
                self.create_bean_internal(&merged)
            }
            BeanScope::Custom(scope_name) => {
                let strategy = self
                    .scopes
                    .read()
                    .get(&scope_name)
                    .cloned()
                    .ok_or(ContainerError::UnknownScope(scope_name))?;
                let mut create = || self.create_bean_internal(&merged);
                strategy.get(&canonical, &mut create)
            }
        }
    }

    fn contains_bean(&self, name: &str) -> bool {
        let canonical = self.canonical_name(name);
        self.singletons.contains(&canonical)
            || self.definitions.read().contains_key(&canonical)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.contains_bean(&canonical))
    }

    fn is_singleton(&self, name: &str) -> ContainerResult<bool> {
        let canonical = self.canonical_name(name);
        if !self.definitions.read().contains_key(&canonical) {
            if self.singletons.contains(&canonical) {
                return Ok(true);
            }
            if let Some(parent) = &self.parent {
                return parent.is_singleton(&canonical);
            }
        }
        Ok(self.merged_definition(&canonical)?.scope.is_singleton())
    }

    fn is_prototype(&self, name: &str) -> ContainerResult<bool> {
        let canonical = self.canonical_name(name);
        if !self.definitions.read().contains_key(&canonical) {
            if self.singletons.contains(&canonical) {
                return Ok(false);
            }
            if let Some(parent) = &self.parent {
                return parent.is_prototype(&canonical);
            }
        }
        Ok(self.merged_definition(&canonical)?.scope.is_prototype())
    }
}

impl BeanFactoryExt for DefaultListableBeanFactory {
    fn get_bean_as<T: Any + Send + Sync>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.get_bean(name)?
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_string(),
                requested: std::any::type_name::<T>().to_string(),
            })
    }

    fn get_bean_by_type<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        let descriptor =
            DependencyDescriptor::from_descriptor(&TypeDescriptor::of::<T>()).for_bean("<lookup>");
        let candidates = self.candidates_for(TypeId::of::<T>(), None);
        let picked = select_candidate(&descriptor, &candidates)?;
        self.get_bean_as::<T>(&picked.name)
    }

    fn contains_bean_by_type<T: Any + Send + Sync>(&self) -> bool {
        !self.candidates_for(TypeId::of::<T>(), None).is_empty()
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn bean_definition_names(&self) -> Vec<String> {
        self.definition_order.read().clone()
    }

    fn bean_names_for_type(&self, type_id: TypeId) -> Vec<String> {
        self.candidates_for(type_id, None)
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    fn bean_definition_count(&self) -> usize {
        self.definitions.read().len()
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn register_bean_definition(
        &self,
        name: &str,
        definition: BeanDefinition,
    ) -> ContainerResult<()> {
        self.ensure_mutable()?;
        let mut definitions = self.definitions.write();
        if definitions.insert(name.to_string(), definition).is_none() {
            self.definition_order.write().push(name.to_string());
        }
        drop(definitions);
        self.merged.write().clear();
        Ok(())
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    fn remove_bean_definition(&self, name: &str) -> ContainerResult<()> {
        self.ensure_mutable()?;
        if self.definitions.write().remove(name).is_none() {
            return Err(ContainerError::NoSuchBeanDefinition(name.to_string()));
        }
        self.definition_order.write().retain(|n| n != name);
        self.merged.write().clear();
        Ok(())
    }

    fn bean_definition(&self, name: &str) -> ContainerResult<BeanDefinition> {
        self.definitions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::NoSuchBeanDefinition(name.to_string()))
    }

    fn modify_bean_definition<F>(&self, name: &str, modifier: F) -> ContainerResult<()>
    where
        F: FnOnce(&mut BeanDefinition),
    {
        self.ensure_mutable()?;
        let mut definitions = self.definitions.write();
        let definition = definitions
            .get_mut(name)
            .ok_or_else(|| ContainerError::NoSuchBeanDefinition(name.to_string()))?;
        modifier(definition);
        drop(definitions);
        self.merged.write().clear();
        Ok(())
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut processors = self.processors.write();
        processors.push(processor);
        // stable sort keeps registration order for equal orders
        processors.sort_by_key(|p| p.order());
    }

    fn register_alias(&self, name: &str, alias: &str) -> ContainerResult<()> {
        if alias == name {
            return Ok(());
        }
        if self.definitions.read().contains_key(alias) {
            return Err(ContainerError::DefinitionStore {
                name: alias.to_string(),
                message: "alias clashes with an existing bean definition".to_string(),
            });
        }
        self.aliases
            .write()
            .insert(alias.to_string(), name.to_string());
        Ok(())
    }

    fn register_scope(&self, name: &str, strategy: Arc<dyn ScopeStrategy>) {
        self.scopes.write().insert(name.to_string(), strategy);
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn pre_instantiate_singletons(&self) -> ContainerResult<()> {
        let names = self.definition_order.read().clone();
        info!(count = names.len(), "pre-instantiating singletons");
        for name in names {
            let merged = self.merged_definition(&name)?;
            if merged.abstract_definition || !merged.scope.is_singleton() || merged.lazy_init {
                continue;
            }
            self.get_bean(&name)?;
        }
        Ok(())
    }

    fn freeze_configuration(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    fn is_configuration_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    fn destroy_singletons(&self) {
        let order = self.singletons.destruction_order();
        info!(count = order.len(), "destroying singletons");
        let processors = self.processors();
        for name in order {
            self.destroy_singleton(&name, &processors);
        }
        self.singletons.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::class::BeanClassBuilder;
    use crate::convert::ConvertiblePair;
    use crate::error::ConversionError;

    trait Repository: Send + Sync {
        fn label(&self) -> &str;
    }

    struct PgRepository {
        url: String,
    }

    impl Repository for PgRepository {
        fn label(&self) -> &str {
            &self.url
        }
    }

    struct MemRepository;

    impl Repository for MemRepository {
        fn label(&self) -> &str {
            "mem"
        }
    }

    struct UserService {
        repository: Arc<dyn Repository>,
        retries: i64,
    }

    #[derive(Default)]
    struct Consumer {
        repository: Option<Arc<dyn Repository>>,
    }

    #[derive(Default)]
    struct Aggregator {
        repos: Vec<Arc<dyn Repository>>,
    }

    struct Settings {
        port: i64,
    }

    fn pg_class() -> Arc<BeanClass> {
        BeanClassBuilder::<PgRepository>::new()
            .default_constructor(|| PgRepository { url: "pg".into() })
            .property::<String, _>("url", |r, v| r.url = v)
            .provides::<dyn Repository, _>(|arc| arc)
            .build()
    }

    fn mem_class() -> Arc<BeanClass> {
        BeanClassBuilder::<MemRepository>::new()
            .default_constructor(|| MemRepository)
            .provides::<dyn Repository, _>(|arc| arc)
            .build()
    }

    fn user_service_class() -> Arc<BeanClass> {
        BeanClassBuilder::<UserService>::new()
            .constructor(
                vec![
                    ParamSpec::of::<Arc<dyn Repository>>("repository"),
                    ParamSpec::of::<i64>("retries").optional(),
                ],
                |mut args| {
                    Ok(UserService {
                        repository: args.take(0)?,
                        retries: args.take::<Option<i64>>(1)?.unwrap_or(3),
                    })
                },
            )
            .build()
    }

    fn consumer_class() -> Arc<BeanClass> {
        BeanClassBuilder::<Consumer>::new()
            .default_constructor(Consumer::default)
            .property::<Arc<dyn Repository>, _>("repository", |c, v| c.repository = Some(v))
            .build()
    }

    fn aggregator_class() -> Arc<BeanClass> {
        BeanClassBuilder::<Aggregator>::new()
            .default_constructor(Aggregator::default)
            .property::<Vec<Arc<dyn Repository>>, _>("repos", |a, v| a.repos = v)
            .build()
    }

    fn settings_class() -> Arc<BeanClass> {
        BeanClassBuilder::<Settings>::new()
            .constructor(vec![ParamSpec::of::<i64>("port")], |mut args| {
                Ok(Settings {
                    port: args.take(0)?,
                })
            })
            .factory_method::<Settings, _>(
                "from_port",
                vec![ParamSpec::of::<i64>("port")],
                |mut args| {
                    Ok(Settings {
                        port: args.take(0)?,
                    })
                },
            )
            .build()
    }

    #[test]
    fn test_singleton_is_cached_prototype_is_not() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory
            .register_bean_definition(
                "scratch",
                BeanDefinition::of::<PgRepository>().with_scope(BeanScope::Prototype),
            )
            .unwrap();

        let first = factory.get_bean("pgRepository").unwrap();
        let second = factory.get_bean("pgRepository").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let third = factory.get_bean("scratch").unwrap();
        let fourth = factory.get_bean("scratch").unwrap();
        assert!(!Arc::ptr_eq(&third, &fourth));
        assert!(!factory.contains_singleton("scratch"));
    }

    #[test]
    fn test_constructor_autowiring_fills_missing_params() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(user_service_class());
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory
            .register_bean_definition(
                "userService",
                BeanDefinition::of::<UserService>().with_autowire(AutowireMode::Constructor),
            )
            .unwrap();

        let service = factory.get_bean_as::<UserService>("userService").unwrap();
        assert_eq!(service.repository.label(), "pg");
        // optional parameter without a candidate falls back to the default
        assert_eq!(service.retries, 3);
    }

    #[test]
    fn test_explicit_constructor_args_are_converted() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(settings_class());
        factory
            .register_bean_definition(
                "settings",
                BeanDefinition::of::<Settings>()
                    .with_indexed_constructor_arg(0, ValueHolder::of("8080")),
            )
            .unwrap();

        let settings = factory.get_bean_as::<Settings>("settings").unwrap();
        assert_eq!(settings.port, 8080);
    }

    #[test]
    fn test_static_factory_method_instantiation() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(settings_class());
        factory
            .register_bean_definition(
                "settings",
                BeanDefinition::of::<Settings>()
                    .with_factory_method("from_port")
                    .with_indexed_constructor_arg(0, ValueHolder::of(9090i64)),
            )
            .unwrap();

        let settings = factory.get_bean_as::<Settings>("settings").unwrap();
        assert_eq!(settings.port, 9090);
    }

    #[test]
    fn test_by_type_ambiguity_and_primary_resolution() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(mem_class());
        factory.register_bean_class(consumer_class());
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory
            .register_bean_definition("memRepository", BeanDefinition::of::<MemRepository>())
            .unwrap();
        factory
            .register_bean_definition(
                "consumer",
                BeanDefinition::of::<Consumer>().with_autowire(AutowireMode::ByType),
            )
            .unwrap();

        match factory.get_bean("consumer") {
            Err(ContainerError::AmbiguousDependency { candidates, .. }) => {
                let mut candidates = candidates;
                candidates.sort();
                assert_eq!(candidates, vec!["memRepository", "pgRepository"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        // the failed attempt must not leave a half-built singleton behind
        assert!(!factory.contains_singleton("consumer"));

        factory
            .modify_bean_definition("memRepository", |d| d.primary = true)
            .unwrap();
        let consumer = factory.get_bean_as::<Consumer>("consumer").unwrap();
        assert_eq!(consumer.repository.as_ref().unwrap().label(), "mem");
    }

    #[test]
    fn test_by_name_autowiring_uses_property_name() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(consumer_class());
        factory
            .register_bean_definition("repository", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory
            .register_bean_definition(
                "consumer",
                BeanDefinition::of::<Consumer>().with_autowire(AutowireMode::ByName),
            )
            .unwrap();

        let consumer = factory.get_bean_as::<Consumer>("consumer").unwrap();
        assert_eq!(consumer.repository.as_ref().unwrap().label(), "pg");
    }

    #[test]
    fn test_collection_injection_follows_explicit_order() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(mem_class());
        factory.register_bean_class(aggregator_class());
        // registered before mem, but its higher order puts it second
        factory
            .register_bean_definition(
                "pgRepository",
                BeanDefinition::of::<PgRepository>().with_order(2),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "memRepository",
                BeanDefinition::of::<MemRepository>().with_order(1),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "aggregator",
                BeanDefinition::of::<Aggregator>().with_autowire(AutowireMode::ByType),
            )
            .unwrap();

        let aggregator = factory.get_bean_as::<Aggregator>("aggregator").unwrap();
        let labels: Vec<&str> = aggregator.repos.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["mem", "pg"]);
    }

    #[test]
    fn test_concurrent_singleton_creation_is_single_flight() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let class = BeanClassBuilder::<MemRepository>::new()
            .default_constructor(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                MemRepository
            })
            .build();

        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(class);
        factory
            .register_bean_definition("memRepository", BeanDefinition::of::<MemRepository>())
            .unwrap();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                thread::spawn(move || factory.get_bean("memRepository").unwrap())
            })
            .collect();
        let results: Vec<BeanInstance> =
            workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    struct CycleA {
        b: Arc<CycleB>,
    }

    struct CycleB {
        a: Option<Arc<CycleA>>,
    }

    fn cycle_classes() -> (Arc<BeanClass>, Arc<BeanClass>) {
        let a = BeanClassBuilder::<CycleA>::new()
            .constructor(vec![ParamSpec::of::<Arc<CycleB>>("b")], |mut args| {
                Ok(CycleA {
                    b: args.take(0)?,
                })
            })
            .build();
        let b = BeanClassBuilder::<CycleB>::new()
            .default_constructor(|| CycleB { a: None })
            .constructor(vec![ParamSpec::of::<Arc<CycleA>>("a")], |mut args| {
                Ok(CycleB {
                    a: Some(args.take(0)?),
                })
            })
            .build();
        (a, b)
    }

    #[test]
    fn test_constructor_cycle_is_rejected_and_recoverable() {
        let factory = DefaultListableBeanFactory::new();
        let (a, b) = cycle_classes();
        factory.register_bean_class(a);
        factory.register_bean_class(b);
        factory
            .register_bean_definition(
                "cycleA",
                BeanDefinition::of::<CycleA>().with_autowire(AutowireMode::Constructor),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "cycleB",
                BeanDefinition::of::<CycleB>().with_autowire(AutowireMode::Constructor),
            )
            .unwrap();

        match factory.get_bean("cycleA") {
            Err(ContainerError::CircularDependency { chain, .. }) => {
                assert_eq!(chain, vec!["cycleA".to_string(), "cycleB".to_string()]);
            }
            other => panic!("expected a circular dependency, got {other:?}"),
        }
        assert!(!factory.contains_singleton("cycleA"));
        assert!(!factory.contains_singleton("cycleB"));

        // break the cycle, then the same names resolve cleanly
        factory
            .modify_bean_definition("cycleB", |d| d.autowire = Some(AutowireMode::No))
            .unwrap();
        let a = factory.get_bean_as::<CycleA>("cycleA").unwrap();
        assert!(a.b.a.is_none());
    }

    #[derive(Default)]
    struct Engine {
        starter: Option<BeanHandle>,
    }

    #[derive(Default)]
    struct Starter {
        engine: Option<Arc<Engine>>,
    }

    #[test]
    fn test_reference_cycle_resolves_through_deferred_handle() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(
            BeanClassBuilder::<Engine>::new()
                .default_constructor(Engine::default)
                .lazy_property::<Starter, _>("starter", |e, h| e.starter = Some(h))
                .build(),
        );
        factory.register_bean_class(
            BeanClassBuilder::<Starter>::new()
                .default_constructor(Starter::default)
                .property::<Arc<Engine>, _>("engine", |s, v| s.engine = Some(v))
                .build(),
        );
        factory
            .register_bean_definition(
                "engine",
                BeanDefinition::of::<Engine>()
                    .with_property("starter", ValueHolder::reference("starter")),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "starter",
                BeanDefinition::of::<Starter>()
                    .with_property("engine", ValueHolder::reference("engine")),
            )
            .unwrap();

        let starter = factory.get_bean_as::<Starter>("starter").unwrap();
        let engine = starter.engine.clone().unwrap();
        let handle = engine.starter.clone().unwrap();

        // the handle observes the same instance the container cached
        assert!(handle.is_ready());
        let resolved = handle.get::<Starter>().unwrap();
        assert!(Arc::ptr_eq(&starter, &resolved));
    }

    struct Replacer {
        after_init: Arc<AtomicUsize>,
    }

    impl BeanPostProcessor for Replacer {
        fn before_instantiation(
            &self,
            _class: &BeanClass,
            bean_name: &str,
        ) -> ContainerResult<Option<BeanInstance>> {
            if bean_name == "pgRepository" {
                let stub: BeanInstance = Arc::new(PgRepository {
                    url: "stub".into(),
                });
                Ok(Some(stub))
            } else {
                Ok(None)
            }
        }

        fn after_initialization(
            &self,
            bean: BeanInstance,
            _bean_name: &str,
        ) -> ContainerResult<BeanInstance> {
            self.after_init.fetch_add(1, Ordering::SeqCst);
            Ok(bean)
        }
    }

    #[test]
    fn test_before_instantiation_short_circuits_pipeline() {
        let constructed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructed);
        let class = BeanClassBuilder::<PgRepository>::new()
            .default_constructor(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                PgRepository { url: "real".into() }
            })
            .build();

        let after_init = Arc::new(AtomicUsize::new(0));
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(class);
        factory.add_bean_post_processor(Arc::new(Replacer {
            after_init: Arc::clone(&after_init),
        }));
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();

        let bean = factory.get_bean_as::<PgRepository>("pgRepository").unwrap();
        assert_eq!(bean.url, "stub");
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
        assert_eq!(after_init.load(Ordering::SeqCst), 1);
    }

    struct DestructionLog {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl BeanPostProcessor for DestructionLog {
        fn requires_destruction(&self, _bean: &BeanInstance, _bean_name: &str) -> bool {
            true
        }

        fn before_destruction(
            &self,
            _bean: &BeanInstance,
            bean_name: &str,
        ) -> ContainerResult<()> {
            self.log.lock().push(bean_name.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_destruction_destroys_dependents_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(consumer_class());
        factory.add_bean_post_processor(Arc::new(DestructionLog {
            log: Arc::clone(&log),
        }));
        factory
            .register_bean_definition("repo", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory
            .register_bean_definition(
                "holder",
                BeanDefinition::of::<Consumer>()
                    .with_property("repository", ValueHolder::reference("repo")),
            )
            .unwrap();

        factory.get_bean("holder").unwrap();
        factory.destroy_singletons();

        assert_eq!(*log.lock(), vec!["holder".to_string(), "repo".to_string()]);
        assert_eq!(factory.singleton_count(), 0);
    }

    #[test]
    fn test_destroy_method_runs_on_destruction() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&shutdowns);
        let class = BeanClassBuilder::<MemRepository>::new()
            .default_constructor(|| MemRepository)
            .method("shutdown", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();

        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(class);
        factory
            .register_bean_definition(
                "memRepository",
                BeanDefinition::of::<MemRepository>().with_destroy_method("shutdown"),
            )
            .unwrap();

        let bean = factory.get_bean("memRepository").unwrap();
        drop(bean);
        factory.destroy_singletons();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_destroy_method_skipped_while_instance_is_shared() {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&shutdowns);
        let class = BeanClassBuilder::<MemRepository>::new()
            .default_constructor(|| MemRepository)
            .method("shutdown", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();

        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(class);
        factory
            .register_bean_definition(
                "memRepository",
                BeanDefinition::of::<MemRepository>().with_destroy_method("shutdown"),
            )
            .unwrap();

        // an outside handle keeps the instance shared through destruction
        let bean = factory.get_bean("memRepository").unwrap();
        factory.destroy_singletons();
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);
        assert_eq!(factory.singleton_count(), 0);
        drop(bean);
    }

    #[test]
    fn test_init_method_runs_after_population() {
        struct Ready {
            url: String,
            announced: Option<String>,
        }

        let class = BeanClassBuilder::<Ready>::new()
            .default_constructor(|| Ready {
                url: String::new(),
                announced: None,
            })
            .property::<String, _>("url", |r, v| r.url = v)
            .method("announce", |r: &mut Ready| {
                r.announced = Some(format!("ready at {}", r.url));
                Ok(())
            })
            .build();

        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(class);
        factory
            .register_bean_definition(
                "ready",
                BeanDefinition::of::<Ready>()
                    .with_property("url", ValueHolder::of("db://local"))
                    .with_init_method("announce"),
            )
            .unwrap();

        let bean = factory.get_bean_as::<Ready>("ready").unwrap();
        assert_eq!(bean.announced.as_deref(), Some("ready at db://local"));
    }

    struct CountingConverter {
        hits: Arc<AtomicUsize>,
    }

    impl Converter for CountingConverter {
        fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
            vec![ConvertiblePair::exact::<String, i64>()]
        }

        fn convert(
            &self,
            value: &BeanValue,
            _source: &TypeDescriptor,
            _target: &TypeDescriptor,
        ) -> Result<BeanValue, ConversionError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let parsed = value
                .as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or_default();
            Ok(BeanValue::Int(parsed))
        }
    }

    #[test]
    fn test_literal_conversion_is_cached_across_prototype_creations() {
        let hits = Arc::new(AtomicUsize::new(0));
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(settings_class());
        factory.add_converter(Arc::new(CountingConverter {
            hits: Arc::clone(&hits),
        }));
        factory
            .register_bean_definition(
                "settings",
                BeanDefinition::of::<Settings>()
                    .with_scope(BeanScope::Prototype)
                    .with_indexed_constructor_arg(0, ValueHolder::of("8080")),
            )
            .unwrap();

        let first = factory.get_bean_as::<Settings>("settings").unwrap();
        let second = factory.get_bean_as::<Settings>("settings").unwrap();
        assert_eq!(first.port, 8080);
        assert_eq!(second.port, 8080);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_required_property_must_be_set() {
        struct Strict {
            url: Option<String>,
        }

        let class = BeanClassBuilder::<Strict>::new()
            .default_constructor(|| Strict { url: None })
            .required_property::<String, _>("url", |s, v| s.url = Some(v))
            .build();

        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(class);
        factory
            .register_bean_definition("bare", BeanDefinition::of::<Strict>())
            .unwrap();
        factory
            .register_bean_definition(
                "configured",
                BeanDefinition::of::<Strict>()
                    .with_property("url", ValueHolder::of("db://local")),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("bare"),
            Err(ContainerError::UnsatisfiedDependency { property, .. }) if property == "url"
        ));
        let bean = factory.get_bean_as::<Strict>("configured").unwrap();
        assert_eq!(bean.url.as_deref(), Some("db://local"));
    }

    #[test]
    fn test_parent_definition_template_merging() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory
            .register_bean_definition(
                "template",
                BeanDefinition::abstract_template()
                    .with_property("url", ValueHolder::of("db://shared")),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "concrete",
                BeanDefinition::of::<PgRepository>().with_parent("template"),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("template"),
            Err(ContainerError::AbstractDefinition(_))
        ));
        let bean = factory.get_bean_as::<PgRepository>("concrete").unwrap();
        assert_eq!(bean.url, "db://shared");
    }

    #[test]
    fn test_parent_factory_serves_missing_beans() {
        let parent = DefaultListableBeanFactory::new();
        parent.register_bean_class(pg_class());
        parent
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();

        let child = DefaultListableBeanFactory::with_parent(Arc::clone(&parent));
        child.register_bean_class(consumer_class());
        child
            .register_bean_definition(
                "consumer",
                BeanDefinition::of::<Consumer>().with_autowire(AutowireMode::ByType),
            )
            .unwrap();

        assert!(child.contains_bean("pgRepository"));
        let consumer = child.get_bean_as::<Consumer>("consumer").unwrap();
        assert_eq!(consumer.repository.as_ref().unwrap().label(), "pg");
        // the dependency was cached where it is defined
        assert!(parent.contains_singleton("pgRepository"));
    }

    #[test]
    fn test_alias_resolves_to_same_singleton() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory.register_alias("pgRepository", "db").unwrap();

        let by_name = factory.get_bean("pgRepository").unwrap();
        let by_alias = factory.get_bean("db").unwrap();
        assert!(Arc::ptr_eq(&by_name, &by_alias));
    }

    #[test]
    fn test_definition_holder_registers_aliases() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory
            .register_bean_definition_holder(
                BeanDefinitionHolder::new("pgRepository", BeanDefinition::of::<PgRepository>())
                    .with_alias("db")
                    .with_alias("primaryDb"),
            )
            .unwrap();

        let by_name = factory.get_bean("pgRepository").unwrap();
        let by_alias = factory.get_bean("db").unwrap();
        assert!(Arc::ptr_eq(&by_name, &by_alias));
        assert!(Arc::ptr_eq(&by_name, &factory.get_bean("primaryDb").unwrap()));
    }

    #[test]
    fn test_frozen_configuration_rejects_changes() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory.freeze_configuration();

        assert!(factory.is_configuration_frozen());
        assert!(matches!(
            factory.register_bean_definition("other", BeanDefinition::of::<PgRepository>()),
            Err(ContainerError::FrozenConfiguration)
        ));
        assert!(matches!(
            factory.remove_bean_definition("pgRepository"),
            Err(ContainerError::FrozenConfiguration)
        ));
        // reads still work
        assert!(factory.get_bean("pgRepository").is_ok());
    }

    #[test]
    fn test_pre_instantiation_skips_lazy_and_prototypes() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(mem_class());
        factory
            .register_bean_definition("eager", BeanDefinition::of::<PgRepository>())
            .unwrap();
        factory
            .register_bean_definition(
                "deferred",
                BeanDefinition::of::<MemRepository>().with_lazy_init(true),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "scratch",
                BeanDefinition::of::<MemRepository>().with_scope(BeanScope::Prototype),
            )
            .unwrap();

        factory.pre_instantiate_singletons().unwrap();
        assert!(factory.contains_singleton("eager"));
        assert!(!factory.contains_singleton("deferred"));
        assert!(!factory.contains_singleton("scratch"));
    }

    #[test]
    fn test_depends_on_cycle_is_rejected() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(mem_class());
        factory
            .register_bean_definition(
                "a",
                BeanDefinition::of::<PgRepository>().with_depends_on(["b"]),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::of::<MemRepository>().with_depends_on(["a"]),
            )
            .unwrap();

        assert!(matches!(
            factory.get_bean("a"),
            Err(ContainerError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_depends_on_creates_dependency_first() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(mem_class());
        factory
            .register_bean_definition(
                "app",
                BeanDefinition::of::<PgRepository>().with_depends_on(["db"]),
            )
            .unwrap();
        factory
            .register_bean_definition("db", BeanDefinition::of::<MemRepository>())
            .unwrap();

        factory.get_bean("app").unwrap();
        assert!(factory.contains_singleton("db"));
    }

    #[derive(Default)]
    struct CachingScope {
        cache: Mutex<HashMap<String, BeanInstance>>,
    }

    impl ScopeStrategy for CachingScope {
        fn get(
            &self,
            name: &str,
            create: &mut dyn FnMut() -> ContainerResult<BeanInstance>,
        ) -> ContainerResult<BeanInstance> {
            if let Some(instance) = self.cache.lock().get(name) {
                return Ok(instance.clone());
            }
            let instance = create()?;
            self.cache.lock().insert(name.to_string(), instance.clone());
            Ok(instance)
        }

        fn remove(&self, name: &str) -> Option<BeanInstance> {
            self.cache.lock().remove(name)
        }
    }

    #[test]
    fn test_custom_scope_controls_instance_lifetime() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(mem_class());
        factory.register_scope("request", Arc::new(CachingScope::default()));
        factory
            .register_bean_definition(
                "scoped",
                BeanDefinition::of::<MemRepository>()
                    .with_scope(BeanScope::Custom("request".into())),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "unhinged",
                BeanDefinition::of::<MemRepository>()
                    .with_scope(BeanScope::Custom("session".into())),
            )
            .unwrap();

        let first = factory.get_bean("scoped").unwrap();
        let second = factory.get_bean("scoped").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(
            factory.get_bean("unhinged"),
            Err(ContainerError::UnknownScope(name)) if name == "session"
        ));
    }

    #[test]
    fn test_manual_singleton_is_discoverable_by_type() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_singleton("handWired", Arc::new(PgRepository { url: "manual".into() }))
            .unwrap();

        // manual singletons only self-cast, so ask for the concrete type
        let repo = factory.get_bean_as::<PgRepository>("handWired").unwrap();
        assert_eq!(repo.url, "manual");
        assert!(factory.contains_bean_by_type::<PgRepository>());
    }

    #[test]
    fn test_resolvable_dependency_bypasses_candidates() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(consumer_class());
        let ambient: Arc<dyn Repository> = Arc::new(PgRepository { url: "ambient".into() });
        factory.register_resolvable_dependency::<dyn Repository>(ambient);
        factory
            .register_bean_definition(
                "consumer",
                BeanDefinition::of::<Consumer>().with_autowire(AutowireMode::ByType),
            )
            .unwrap();

        let consumer = factory.get_bean_as::<Consumer>("consumer").unwrap();
        assert_eq!(consumer.repository.as_ref().unwrap().label(), "ambient");
    }

    #[test]
    fn test_get_bean_by_type_lookup() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();

        let repo = factory.get_bean_by_type::<PgRepository>().unwrap();
        assert_eq!(repo.url, "pg");
        assert!(factory.contains_bean_by_type::<PgRepository>());
        assert!(!factory.contains_bean_by_type::<Settings>());
        assert_eq!(
            factory.bean_names_for_type(TypeId::of::<dyn Repository>()),
            vec!["pgRepository"]
        );
    }

    #[test]
    fn test_configure_bean_applies_named_definition() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory
            .register_bean_definition(
                "pgRepository",
                BeanDefinition::of::<PgRepository>()
                    .with_property("url", ValueHolder::of("db://configured")),
            )
            .unwrap();

        let raw: BeanObject = Box::new(PgRepository { url: String::new() });
        let configured = factory.configure_bean(raw, "pgRepository").unwrap();
        let repo = configured.downcast::<PgRepository>().ok().unwrap();
        assert_eq!(repo.url, "db://configured");
    }

    #[test]
    fn test_autowire_existing_instance() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_class(pg_class());
        factory.register_bean_class(consumer_class());
        factory
            .register_bean_definition("pgRepository", BeanDefinition::of::<PgRepository>())
            .unwrap();

        let mut consumer = Consumer::default();
        factory
            .autowire_bean_properties(
                &mut consumer,
                AutowireMode::ByType,
                DependencyCheck::None,
            )
            .unwrap();
        assert_eq!(consumer.repository.as_ref().unwrap().label(), "pg");
    }
}
