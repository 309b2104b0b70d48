//! Runtime class metadata.
//!
//! A [`BeanClass`] is the type-erased description the factory works with:
//! constructors with named parameters, settable properties, lifecycle methods
//! and factory methods, plus the set of additional types (typically trait
//! objects) an instance can be handed out as. Classes are built once with
//! [`BeanClassBuilder`] and shared behind `Arc`.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::RwLock;

use crate::convert::TypeDescriptor;
use crate::error::{ContainerError, ContainerResult};
use crate::singleton::BeanHandle;
use crate::value::{BeanInstance, BeanValue, FromBeanValue};

/// A freshly constructed, not yet shared bean object.
pub type BeanObject = Box<dyn Any + Send + Sync>;

type ConstructorFn = Box<dyn Fn(ArgList) -> ContainerResult<BeanObject> + Send + Sync>;
type SetterFn = Box<dyn Fn(&mut dyn Any, BeanValue) -> ContainerResult<()> + Send + Sync>;
type MethodFn = Box<dyn Fn(&mut dyn Any) -> anyhow::Result<()> + Send + Sync>;
type CastFn = Box<dyn Fn(&BeanInstance) -> Option<BeanValue> + Send + Sync>;

/// Positional arguments handed to a constructor or factory method, in
/// declaration order and already converted to canonical form.
pub struct ArgList {
    values: Vec<BeanValue>,
}

impl ArgList {
    pub fn new(values: Vec<BeanValue>) -> Self {
        ArgList { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the argument at `index` out of the list, extracting it into its
    /// Rust type. Each slot can be taken once.
    pub fn take<P: FromBeanValue>(&mut self, index: usize) -> ContainerResult<P> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| ContainerError::Other(anyhow!("argument index {index} out of range")))?;
        Ok(P::from_value(std::mem::take(slot))?)
    }
}

/// A named constructor or factory-method parameter.
pub struct ParamSpec {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub required: bool,
}

impl ParamSpec {
    pub fn of<P: FromBeanValue>(name: impl Into<String>) -> Self {
        ParamSpec {
            name: name.into(),
            descriptor: P::value_descriptor(),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("type", &self.descriptor.name())
            .field("required", &self.required)
            .finish()
    }
}

pub struct ConstructorSpec {
    pub params: Vec<ParamSpec>,
    invoke: ConstructorFn,
}

impl ConstructorSpec {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn instantiate(&self, args: ArgList) -> ContainerResult<BeanObject> {
        (self.invoke)(args)
    }
}

/// A settable property. `lazy` properties receive a [`BeanHandle`] instead of
/// the resolved dependency, so they can participate in reference cycles.
pub struct PropertySpec {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub required: bool,
    pub lazy: bool,
    setter: SetterFn,
}

impl PropertySpec {
    pub fn apply(&self, instance: &mut dyn Any, value: BeanValue) -> ContainerResult<()> {
        (self.setter)(instance, value)
    }
}

/// A factory method producing bean objects, either free-standing or invoked
/// on a factory bean instance.
pub struct FactoryMethodSpec {
    pub name: String,
    pub params: Vec<ParamSpec>,
    invoke: FactoryInvoke,
}

enum FactoryInvoke {
    Static(ConstructorFn),
    OnBean(Box<dyn Fn(&dyn Any, ArgList) -> ContainerResult<BeanObject> + Send + Sync>),
}

impl FactoryMethodSpec {
    pub fn is_static(&self) -> bool {
        matches!(self.invoke, FactoryInvoke::Static(_))
    }

    pub fn invoke_static(&self, args: ArgList) -> ContainerResult<BeanObject> {
        match &self.invoke {
            FactoryInvoke::Static(f) => f(args),
            FactoryInvoke::OnBean(_) => Err(ContainerError::Other(anyhow!(
                "factory method '{}' requires a factory bean instance",
                self.name
            ))),
        }
    }

    pub fn invoke_on(&self, factory: &dyn Any, args: ArgList) -> ContainerResult<BeanObject> {
        match &self.invoke {
            FactoryInvoke::OnBean(f) => f(factory, args),
            FactoryInvoke::Static(f) => f(args),
        }
    }
}

/// An additional type an instance of this class can be provided as.
pub struct ProvidedType {
    pub type_id: TypeId,
    pub type_name: &'static str,
    cast: CastFn,
}

/// Type-erased class description registered with the container.
pub struct BeanClass {
    type_id: TypeId,
    type_name: &'static str,
    constructors: Vec<ConstructorSpec>,
    properties: Vec<PropertySpec>,
    methods: HashMap<String, MethodFn>,
    factory_methods: HashMap<String, FactoryMethodSpec>,
    provides: Vec<ProvidedType>,
}

impl BeanClass {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn constructors(&self) -> &[ConstructorSpec] {
        &self.constructors
    }

    pub fn properties(&self) -> &[PropertySpec] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn default_constructor(&self) -> Option<&ConstructorSpec> {
        self.constructors.iter().find(|c| c.params.is_empty())
    }

    pub fn has_nondefault_constructor(&self) -> bool {
        self.constructors.iter().any(|c| !c.params.is_empty())
    }

    pub fn factory_method(&self, name: &str) -> Option<&FactoryMethodSpec> {
        self.factory_methods.get(name)
    }

    /// Invokes a declared zero-argument method (init/destroy callbacks).
    pub fn invoke_method(&self, instance: &mut dyn Any, method: &str) -> ContainerResult<()> {
        let f = self
            .methods
            .get(method)
            .ok_or_else(|| ContainerError::UnknownMethod {
                type_name: self.type_name.to_string(),
                method: method.to_string(),
            })?;
        f(instance).map_err(|source| ContainerError::LifecycleMethod {
            name: self.type_name.to_string(),
            method: method.to_string(),
            source,
        })
    }

    pub fn provides_type(&self, type_id: TypeId) -> bool {
        self.provides.iter().any(|p| p.type_id == type_id)
    }

    /// Re-wraps a shared instance as one of the provided types.
    pub fn cast_to(&self, instance: &BeanInstance, type_id: TypeId) -> Option<BeanValue> {
        self.provides
            .iter()
            .find(|p| p.type_id == type_id)
            .and_then(|p| (p.cast)(instance))
    }

    pub fn provided_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.provides.iter().map(|p| p.type_id)
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("type_name", &self.type_name)
            .field("constructors", &self.constructors.len())
            .field("properties", &self.properties.iter().map(|p| &p.name).collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`BeanClass`] metadata.
pub struct BeanClassBuilder<T> {
    class: BeanClass,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> BeanClassBuilder<T> {
    pub fn new() -> Self {
        let mut class = BeanClass {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            constructors: Vec::new(),
            properties: Vec::new(),
            methods: HashMap::new(),
            factory_methods: HashMap::new(),
            provides: Vec::new(),
        };
        // every class provides itself
        class.provides.push(ProvidedType {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            cast: Box::new(|instance: &BeanInstance| {
                Arc::clone(instance)
                    .downcast::<T>()
                    .ok()
                    .map(BeanValue::wrap_shared)
            }),
        });
        BeanClassBuilder {
            class,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn constructor<F>(mut self, params: Vec<ParamSpec>, build: F) -> Self
    where
        F: Fn(ArgList) -> ContainerResult<T> + Send + Sync + 'static,
    {
        self.class.constructors.push(ConstructorSpec {
            params,
            invoke: Box::new(move |args| Ok(Box::new(build(args)?) as BeanObject)),
        });
        self
    }

    pub fn default_constructor<F>(self, build: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor(Vec::new(), move |_| Ok(build()))
    }

    pub fn property<P, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        P: FromBeanValue,
        F: Fn(&mut T, P) + Send + Sync + 'static,
    {
        self.property_spec::<P, F>(name, setter, false, false)
    }

    pub fn required_property<P, F>(self, name: impl Into<String>, setter: F) -> Self
    where
        P: FromBeanValue,
        F: Fn(&mut T, P) + Send + Sync + 'static,
    {
        self.property_spec::<P, F>(name, setter, true, false)
    }

    /// Declares a property whose dependency is delivered as a [`BeanHandle`]
    /// instead of the resolved instance. `U` is the dependency's logical type
    /// used for candidate matching.
    pub fn lazy_property<U, F>(mut self, name: impl Into<String>, setter: F) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(&mut T, BeanHandle) + Send + Sync + 'static,
    {
        let name = name.into();
        self.class.properties.push(PropertySpec {
            name,
            descriptor: TypeDescriptor::of::<U>(),
            required: false,
            lazy: true,
            setter: Box::new(move |instance, value| {
                let target = downcast_mut::<T>(instance)?;
                setter(target, BeanHandle::from_value(value)?);
                Ok(())
            }),
        });
        self
    }

    fn property_spec<P, F>(mut self, name: impl Into<String>, setter: F, required: bool, lazy: bool) -> Self
    where
        P: FromBeanValue,
        F: Fn(&mut T, P) + Send + Sync + 'static,
    {
        let name = name.into();
        self.class.properties.push(PropertySpec {
            name,
            descriptor: P::value_descriptor(),
            required,
            lazy,
            setter: Box::new(move |instance, value| {
                let target = downcast_mut::<T>(instance)?;
                setter(target, P::from_value(value)?);
                Ok(())
            }),
        });
        self
    }

    /// Declares a zero-argument method invokable by name (init/destroy
    /// callbacks).
    pub fn method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.class.methods.insert(
            name.into(),
            Box::new(move |instance| {
                let target = instance
                    .downcast_mut::<T>()
                    .ok_or_else(|| anyhow!("instance is not a {}", std::any::type_name::<T>()))?;
                body(target)
            }),
        );
        self
    }

    /// Declares a static factory method producing `R`.
    pub fn factory_method<R, F>(mut self, name: impl Into<String>, params: Vec<ParamSpec>, build: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(ArgList) -> ContainerResult<R> + Send + Sync + 'static,
    {
        let name = name.into();
        self.class.factory_methods.insert(
            name.clone(),
            FactoryMethodSpec {
                name,
                params,
                invoke: FactoryInvoke::Static(Box::new(move |args| {
                    Ok(Box::new(build(args)?) as BeanObject)
                })),
            },
        );
        self
    }

    /// Declares a factory method invoked on an instance of this class.
    pub fn factory_method_on<R, F>(mut self, name: impl Into<String>, params: Vec<ParamSpec>, build: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn(&T, ArgList) -> ContainerResult<R> + Send + Sync + 'static,
    {
        let name = name.into();
        self.class.factory_methods.insert(
            name.clone(),
            FactoryMethodSpec {
                name,
                params,
                invoke: FactoryInvoke::OnBean(Box::new(move |factory, args| {
                    let factory = factory.downcast_ref::<T>().ok_or_else(|| {
                        ContainerError::Other(anyhow!(
                            "factory bean is not a {}",
                            std::any::type_name::<T>()
                        ))
                    })?;
                    Ok(Box::new(build(factory, args)?) as BeanObject)
                })),
            },
        );
        self
    }

    /// Declares that instances can also be provided as `U` (typically a
    /// trait object), through the given upcast.
    pub fn provides<U, F>(mut self, cast: F) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<U> + Send + Sync + 'static,
    {
        self.class.provides.push(ProvidedType {
            type_id: TypeId::of::<U>(),
            type_name: std::any::type_name::<U>(),
            cast: Box::new(move |instance: &BeanInstance| {
                Arc::clone(instance)
                    .downcast::<T>()
                    .ok()
                    .map(|arc| BeanValue::wrap_shared(cast(arc)))
            }),
        });
        self
    }

    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(self.class)
    }
}

impl<T: Send + Sync + 'static> Default for BeanClassBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast_mut<T: 'static>(instance: &mut dyn Any) -> ContainerResult<&mut T> {
    instance.downcast_mut::<T>().ok_or_else(|| {
        ContainerError::Other(anyhow!("instance is not a {}", std::any::type_name::<T>()))
    })
}

/// Registry of bean classes, addressable by type id or by full type name.
#[derive(Default)]
pub struct ClassRegistry {
    by_id: RwLock<HashMap<TypeId, Arc<BeanClass>>>,
    by_name: RwLock<HashMap<String, Arc<BeanClass>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, class: Arc<BeanClass>) {
        self.by_name
            .write()
            .insert(class.type_name().to_string(), Arc::clone(&class));
        // `type_id()` on the `Arc` would hit `Any::type_id` and key every
        // class under `TypeId::of::<Arc<BeanClass>>`.
        let type_id = BeanClass::type_id(&class);
        self.by_id.write().insert(type_id, class);
    }

    pub fn by_id(&self, type_id: TypeId) -> Option<Arc<BeanClass>> {
        self.by_id.read().get(&type_id).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<BeanClass>> {
        self.by_name.read().get(name).cloned()
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.by_id.read().contains_key(&type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Widget {
        label: String,
        size: i32,
    }

    trait Labeled: Send + Sync {
        fn label(&self) -> &str;
    }

    impl Labeled for Widget {
        fn label(&self) -> &str {
            &self.label
        }
    }

    fn widget_class() -> Arc<BeanClass> {
        BeanClassBuilder::<Widget>::new()
            .default_constructor(|| Widget {
                label: String::new(),
                size: 0,
            })
            .constructor(
                vec![ParamSpec::of::<String>("label"), ParamSpec::of::<i32>("size")],
                |mut args| {
                    Ok(Widget {
                        label: args.take(0)?,
                        size: args.take(1)?,
                    })
                },
            )
            .property::<String, _>("label", |w, v| w.label = v)
            .property::<i32, _>("size", |w, v| w.size = v)
            .provides::<dyn Labeled, _>(|arc| arc)
            .build()
    }

    #[test]
    fn test_constructor_selection_metadata() {
        let class = widget_class();
        assert_eq!(class.constructors().len(), 2);
        assert!(class.default_constructor().is_some());
        assert!(class.has_nondefault_constructor());
    }

    #[test]
    fn test_greedy_constructor_instantiates() {
        let class = widget_class();
        let ctor = class
            .constructors()
            .iter()
            .find(|c| c.arity() == 2)
            .unwrap();
        let args = ArgList::new(vec![BeanValue::from("bolt"), BeanValue::Int(3)]);
        let object = ctor.instantiate(args).unwrap();
        let widget = object.downcast::<Widget>().unwrap();
        assert_eq!(widget.label, "bolt");
        assert_eq!(widget.size, 3);
    }

    #[test]
    fn test_property_setter_extracts_value() {
        let class = widget_class();
        let mut widget = Widget {
            label: String::new(),
            size: 0,
        };
        class
            .property("size")
            .unwrap()
            .apply(&mut widget, BeanValue::Int(9))
            .unwrap();
        assert_eq!(widget.size, 9);
    }

    #[test]
    fn test_provides_trait_object_cast() {
        let class = widget_class();
        let shared: BeanInstance = Arc::new(Widget {
            label: "gear".into(),
            size: 1,
        });
        assert!(class.provides_type(TypeId::of::<dyn Labeled>()));
        let cast = class
            .cast_to(&shared, TypeId::of::<dyn Labeled>())
            .unwrap();
        let labeled = cast.extract_object::<Arc<dyn Labeled>>().unwrap();
        assert_eq!(labeled.label(), "gear");
    }

    #[test]
    fn test_registry_keys_each_class_by_its_own_type() {
        struct Gadget;

        let registry = ClassRegistry::new();
        registry.register(widget_class());
        registry.register(BeanClassBuilder::<Gadget>::new().build());

        let widget = registry.by_id(TypeId::of::<Widget>()).unwrap();
        assert_eq!(widget.type_name(), std::any::type_name::<Widget>());
        let gadget = registry.by_id(TypeId::of::<Gadget>()).unwrap();
        assert_eq!(gadget.type_name(), std::any::type_name::<Gadget>());
        assert!(registry.by_id(TypeId::of::<Arc<BeanClass>>()).is_none());
    }

    #[test]
    fn test_unknown_method_is_reported() {
        let class = widget_class();
        let mut widget = Widget {
            label: String::new(),
            size: 0,
        };
        assert!(matches!(
            class.invoke_method(&mut widget, "frobnicate"),
            Err(ContainerError::UnknownMethod { .. })
        ));
    }
}
