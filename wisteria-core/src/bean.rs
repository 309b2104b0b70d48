//! Bean definition metadata.
//!
//! A [`BeanDefinition`] is the declarative recipe for a bean: type, scope,
//! autowiring mode, constructor arguments, property values and lifecycle
//! method names. Definitions can inherit from a parent definition; the
//! factory folds a parent chain into a [`MergedBeanDefinition`] before any
//! instantiation.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use crate::convert::TypeDescriptor;
use crate::scope::BeanScope;
use crate::value::BeanValue;

/// A by-name reference to another bean, resolvable against this factory or
/// explicitly against the parent factory.
#[derive(Clone, Debug)]
pub struct BeanReference {
    pub target: String,
    pub to_parent: bool,
}

impl BeanReference {
    pub fn to(target: impl Into<String>) -> Self {
        BeanReference {
            target: target.into(),
            to_parent: false,
        }
    }

    pub fn to_parent(target: impl Into<String>) -> Self {
        BeanReference {
            target: target.into(),
            to_parent: true,
        }
    }
}

/// Where a property or constructor-argument value comes from.
#[derive(Clone, Debug)]
pub enum ValueSource {
    /// A literal, converted at apply time.
    Value(BeanValue),
    /// A runtime reference to another bean by name.
    Ref(BeanReference),
    /// An inner definition instantiated privately for this injection point.
    NestedBean(Box<BeanDefinition>),
}

/// A value plus optional type hint, with a cache for the converted result so
/// repeated creations (prototypes) convert each literal only once.
pub struct ValueHolder {
    pub source: ValueSource,
    pub descriptor: Option<TypeDescriptor>,
    pub name: Option<String>,
    converted: OnceLock<BeanValue>,
}

impl ValueHolder {
    pub fn of(value: impl Into<BeanValue>) -> Self {
        ValueHolder {
            source: ValueSource::Value(value.into()),
            descriptor: None,
            name: None,
            converted: OnceLock::new(),
        }
    }

    pub fn reference(target: impl Into<String>) -> Self {
        ValueHolder {
            source: ValueSource::Ref(BeanReference::to(target)),
            descriptor: None,
            name: None,
            converted: OnceLock::new(),
        }
    }

    pub fn nested(definition: BeanDefinition) -> Self {
        ValueHolder {
            source: ValueSource::NestedBean(Box::new(definition)),
            descriptor: None,
            name: None,
            converted: OnceLock::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: TypeDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The cached converted value, if a previous creation already converted
    /// this holder.
    pub fn cached(&self) -> Option<&BeanValue> {
        self.converted.get()
    }

    /// Caches the converted value. Only literal sources are cached; runtime
    /// references resolve fresh on every creation.
    pub fn cache(&self, value: BeanValue) -> &BeanValue {
        self.converted.get_or_init(|| value)
    }
}

impl Clone for ValueHolder {
    fn clone(&self) -> Self {
        let converted = OnceLock::new();
        if let Some(v) = self.converted.get() {
            let _ = converted.set(v.clone());
        }
        ValueHolder {
            source: self.source.clone(),
            descriptor: self.descriptor.clone(),
            name: self.name.clone(),
            converted,
        }
    }
}

impl fmt::Debug for ValueHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueHolder")
            .field("source", &self.source)
            .field("name", &self.name)
            .field("converted", &self.converted.get().is_some())
            .finish()
    }
}

/// Constructor arguments: position-indexed values take precedence, generic
/// values are matched to remaining parameters by type and consumed at most
/// once per resolution attempt.
#[derive(Clone, Debug, Default)]
pub struct ConstructorArgumentValues {
    indexed: BTreeMap<usize, ValueHolder>,
    generic: Vec<ValueHolder>,
}

impl ConstructorArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed(&mut self, index: usize, holder: ValueHolder) {
        self.indexed.insert(index, holder);
    }

    pub fn add_generic(&mut self, holder: ValueHolder) {
        self.generic.push(holder);
    }

    pub fn indexed(&self, index: usize) -> Option<&ValueHolder> {
        self.indexed.get(&index)
    }

    /// Picks an unused generic argument for a parameter: first by matching
    /// declared descriptor or name, then any untyped, unnamed holder.
    pub fn generic_for(
        &self,
        param_name: &str,
        descriptor: &TypeDescriptor,
        used: &HashSet<usize>,
    ) -> Option<(usize, &ValueHolder)> {
        let candidate = self.generic.iter().enumerate().find(|(i, h)| {
            !used.contains(i)
                && (h.name.as_deref() == Some(param_name)
                    || h.descriptor.as_ref() == Some(descriptor))
        });
        candidate.or_else(|| {
            self.generic
                .iter()
                .enumerate()
                .find(|(i, h)| !used.contains(i) && h.name.is_none() && h.descriptor.is_none())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    pub fn arg_count(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    /// Child values override parent values at the same index; generic values
    /// accumulate.
    pub fn merge_from(&mut self, other: &ConstructorArgumentValues) {
        for (index, holder) in &other.indexed {
            self.indexed.insert(*index, holder.clone());
        }
        self.generic.extend(other.generic.iter().cloned());
    }
}

#[derive(Clone, Debug)]
pub struct PropertyValue {
    pub name: String,
    pub holder: ValueHolder,
}

/// Ordered collection of property values. Adding a value for an existing name
/// replaces it in place, keeping the original position.
#[derive(Clone, Debug, Default)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, holder: ValueHolder) {
        let name = name.into();
        match self.values.iter_mut().find(|pv| pv.name == name) {
            Some(existing) => existing.holder = holder,
            None => self.values.push(PropertyValue { name, holder }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.iter().find(|pv| pv.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|pv| pv.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let index = self.values.iter().position(|pv| pv.name == name)?;
        Some(self.values.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn merge_from(&mut self, other: &PropertyValues) {
        for pv in &other.values {
            self.add(pv.name.clone(), pv.holder.clone());
        }
    }
}

/// How unset properties or constructor arguments are autowired.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum AutowireMode {
    /// Explicit values only.
    #[default]
    No,
    /// Each unset property is wired to the bean with the same name, if any.
    ByName,
    /// Each unset property is wired by its declared type.
    ByType,
    /// Arguments of the chosen constructor are wired by type.
    Constructor,
    /// Constructor autowiring when a non-default constructor exists,
    /// otherwise by-type property autowiring.
    Autodetect,
}

/// Post-population verification of property completeness.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum DependencyCheck {
    #[default]
    None,
    /// Verify primitive/simple-typed properties are set.
    Simple,
    /// Verify reference-typed properties are set.
    References,
    All,
}

/// Declarative bean recipe. Every behavioral field is optional so child
/// definitions can override exactly what they declare; unset fields inherit
/// from the parent (or fall back to defaults at merge time).
#[derive(Clone, Debug)]
pub struct BeanDefinition {
    pub type_id: Option<TypeId>,
    pub class_name: Option<String>,
    pub parent: Option<String>,
    pub abstract_definition: bool,
    pub scope: Option<BeanScope>,
    pub lazy_init: Option<bool>,
    pub autowire: Option<AutowireMode>,
    pub dependency_check: Option<DependencyCheck>,
    pub depends_on: Vec<String>,
    pub primary: bool,
    pub autowire_candidate: bool,
    pub order: Option<i32>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
    pub factory_bean: Option<String>,
    pub factory_method: Option<String>,
    pub constructor_args: ConstructorArgumentValues,
    pub property_values: PropertyValues,
    pub attributes: HashMap<String, BeanValue>,
}

impl Default for BeanDefinition {
    fn default() -> Self {
        BeanDefinition {
            type_id: None,
            class_name: None,
            parent: None,
            abstract_definition: false,
            scope: None,
            lazy_init: None,
            autowire: None,
            dependency_check: None,
            depends_on: Vec::new(),
            primary: false,
            autowire_candidate: true,
            order: None,
            init_method: None,
            destroy_method: None,
            factory_bean: None,
            factory_method: None,
            constructor_args: ConstructorArgumentValues::new(),
            property_values: PropertyValues::new(),
            attributes: HashMap::new(),
        }
    }
}

impl BeanDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// A definition for a registered bean class.
    pub fn of<T: 'static>() -> Self {
        BeanDefinition {
            type_id: Some(TypeId::of::<T>()),
            class_name: Some(std::any::type_name::<T>().to_string()),
            ..Self::default()
        }
    }

    /// A pure-template definition that only carries shared configuration.
    pub fn abstract_template() -> Self {
        BeanDefinition {
            abstract_definition: true,
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_scope(mut self, scope: BeanScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn with_autowire(mut self, mode: AutowireMode) -> Self {
        self.autowire = Some(mode);
        self
    }

    pub fn with_dependency_check(mut self, check: DependencyCheck) -> Self {
        self.dependency_check = Some(check);
        self
    }

    pub fn with_depends_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    /// Names the method invoked when the singleton is destroyed.
    ///
    /// The method mutates the instance, so it only runs if the container
    /// holds the last reference at destruction time; an instance still
    /// shared elsewhere is evicted with a warning and the method is skipped.
    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    pub fn with_factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method = Some(method.into());
        self
    }

    pub fn with_factory_bean(
        mut self,
        bean: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.factory_bean = Some(bean.into());
        self.factory_method = Some(method.into());
        self
    }

    pub fn with_constructor_arg(mut self, holder: ValueHolder) -> Self {
        self.constructor_args.add_generic(holder);
        self
    }

    pub fn with_indexed_constructor_arg(mut self, index: usize, holder: ValueHolder) -> Self {
        self.constructor_args.add_indexed(index, holder);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, holder: ValueHolder) -> Self {
        self.property_values.add(name, holder);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<BeanValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// A definition registered under a name, with optional aliases.
#[derive(Clone, Debug)]
pub struct BeanDefinitionHolder {
    pub name: String,
    pub aliases: Vec<String>,
    pub definition: BeanDefinition,
}

impl BeanDefinitionHolder {
    pub fn new(name: impl Into<String>, definition: BeanDefinition) -> Self {
        BeanDefinitionHolder {
            name: name.into(),
            aliases: Vec::new(),
            definition,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// A fully resolved definition: the parent chain folded root-first, every
/// optional field collapsed to its effective value.
#[derive(Clone, Debug)]
pub struct MergedBeanDefinition {
    pub name: String,
    pub type_id: Option<TypeId>,
    pub class_name: Option<String>,
    pub abstract_definition: bool,
    pub scope: BeanScope,
    pub lazy_init: bool,
    pub autowire: AutowireMode,
    pub dependency_check: DependencyCheck,
    pub depends_on: Vec<String>,
    pub primary: bool,
    pub autowire_candidate: bool,
    pub order: Option<i32>,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
    pub factory_bean: Option<String>,
    pub factory_method: Option<String>,
    pub constructor_args: ConstructorArgumentValues,
    pub property_values: PropertyValues,
    pub attributes: HashMap<String, BeanValue>,
}

impl MergedBeanDefinition {
    pub fn empty(name: impl Into<String>) -> Self {
        MergedBeanDefinition {
            name: name.into(),
            type_id: None,
            class_name: None,
            abstract_definition: false,
            scope: BeanScope::default(),
            lazy_init: false,
            autowire: AutowireMode::default(),
            dependency_check: DependencyCheck::default(),
            depends_on: Vec::new(),
            primary: false,
            autowire_candidate: true,
            order: None,
            init_method: None,
            destroy_method: None,
            factory_bean: None,
            factory_method: None,
            constructor_args: ConstructorArgumentValues::new(),
            property_values: PropertyValues::new(),
            attributes: HashMap::new(),
        }
    }

    /// Layers a definition over this merge result. Called root-first along
    /// the parent chain, ending with the definition being resolved; the
    /// abstract flag and candidate/primary markers always come from the
    /// layered definition.
    pub fn apply(&mut self, definition: &BeanDefinition) {
        if definition.type_id.is_some() {
            self.type_id = definition.type_id;
        }
        if definition.class_name.is_some() {
            self.class_name = definition.class_name.clone();
        }
        if let Some(scope) = &definition.scope {
            self.scope = scope.clone();
        }
        if let Some(lazy) = definition.lazy_init {
            self.lazy_init = lazy;
        }
        if let Some(mode) = definition.autowire {
            self.autowire = mode;
        }
        if let Some(check) = definition.dependency_check {
            self.dependency_check = check;
        }
        if !definition.depends_on.is_empty() {
            self.depends_on = definition.depends_on.clone();
        }
        if definition.order.is_some() {
            self.order = definition.order;
        }
        if definition.init_method.is_some() {
            self.init_method = definition.init_method.clone();
        }
        if definition.destroy_method.is_some() {
            self.destroy_method = definition.destroy_method.clone();
        }
        if definition.factory_bean.is_some() {
            self.factory_bean = definition.factory_bean.clone();
        }
        if definition.factory_method.is_some() {
            self.factory_method = definition.factory_method.clone();
        }
        self.abstract_definition = definition.abstract_definition;
        self.primary = definition.primary;
        self.autowire_candidate = definition.autowire_candidate;
        self.constructor_args.merge_from(&definition.constructor_args);
        self.property_values.merge_from(&definition.property_values);
        for (k, v) in &definition.attributes {
            self.attributes.insert(k.clone(), v.clone());
        }
    }

    /// The effective autowire mode with `Autodetect` collapsed.
    pub fn effective_autowire(&self, has_nondefault_constructor: bool) -> AutowireMode {
        match self.autowire {
            AutowireMode::Autodetect if has_nondefault_constructor => AutowireMode::Constructor,
            AutowireMode::Autodetect => AutowireMode::ByType,
            mode => mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_values_replace_in_place() {
        let mut pvs = PropertyValues::new();
        pvs.add("host", ValueHolder::of("localhost"));
        pvs.add("port", ValueHolder::of(8080i64));
        pvs.add("host", ValueHolder::of("example.org"));

        assert_eq!(pvs.len(), 2);
        let names: Vec<_> = pvs.iter().map(|pv| pv.name.as_str()).collect();
        assert_eq!(names, vec!["host", "port"]);
        match &pvs.get("host").unwrap().holder.source {
            ValueSource::Value(v) => assert_eq!(v.as_str(), Some("example.org")),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_merge_child_overrides_parent() {
        let parent = BeanDefinition::abstract_template()
            .with_scope(BeanScope::Prototype)
            .with_lazy_init(true)
            .with_property("host", ValueHolder::of("localhost"))
            .with_property("port", ValueHolder::of(80i64));

        let child = BeanDefinition::new()
            .with_parent("template")
            .with_scope(BeanScope::Singleton)
            .with_property("port", ValueHolder::of(8080i64));

        let mut merged = MergedBeanDefinition::empty("service");
        merged.apply(&parent);
        merged.apply(&child);

        assert_eq!(merged.scope, BeanScope::Singleton);
        // inherited, not overridden
        assert!(merged.lazy_init);
        assert!(!merged.abstract_definition);
        assert_eq!(merged.property_values.len(), 2);
        match &merged.property_values.get("port").unwrap().holder.source {
            ValueSource::Value(v) => assert_eq!(v.as_i64(), Some(8080)),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_generic_arg_matching_prefers_typed() {
        let mut args = ConstructorArgumentValues::new();
        args.add_generic(ValueHolder::of("fallback"));
        args.add_generic(
            ValueHolder::of("typed").with_descriptor(TypeDescriptor::of::<String>()),
        );

        let used = HashSet::new();
        let (index, holder) = args
            .generic_for("label", &TypeDescriptor::of::<String>(), &used)
            .unwrap();
        assert_eq!(index, 1);
        match &holder.source {
            ValueSource::Value(v) => assert_eq!(v.as_str(), Some("typed")),
            other => panic!("unexpected source {other:?}"),
        }

        let mut used = HashSet::new();
        used.insert(1);
        let (index, _) = args
            .generic_for("label", &TypeDescriptor::of::<String>(), &used)
            .unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_value_holder_clone_keeps_cached_conversion() {
        let holder = ValueHolder::of("42");
        holder.cache(BeanValue::Int(42));
        let clone = holder.clone();
        assert_eq!(clone.cached().and_then(|v| v.as_i64()), Some(42));
    }

    #[test]
    fn test_autodetect_collapses_by_constructor_presence() {
        let mut merged = MergedBeanDefinition::empty("svc");
        merged.autowire = AutowireMode::Autodetect;
        assert_eq!(merged.effective_autowire(true), AutowireMode::Constructor);
        assert_eq!(merged.effective_autowire(false), AutowireMode::ByType);
    }
}
