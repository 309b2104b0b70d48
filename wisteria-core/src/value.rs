//! The dynamic value domain flowing through property population and type
//! conversion.
//!
//! Definitions carry literals, configuration sources yield literals, and the
//! dependency resolver yields live instances; [`BeanValue`] is the common
//! currency for all of them. [`FromBeanValue`] is the bridge back into plain
//! Rust types at the injection point.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::convert::TypeDescriptor;
use crate::error::ConversionError;
use crate::singleton::BeanHandle;

/// A type-erased, shared bean instance.
pub type BeanInstance = Arc<dyn Any + Send + Sync>;

/// A live object carried inside a [`BeanValue`], together with the type it
/// logically represents.
///
/// The payload downcasts either to `Arc<T>` (a shared bean, possibly behind a
/// trait object) or to a plain `T` (an object produced by a converter, e.g. an
/// enum variant). Producers pick the wrapping via [`BeanValue::wrap_shared`]
/// and [`BeanValue::wrap_object`].
#[derive(Clone)]
pub struct InstanceValue {
    type_id: TypeId,
    type_name: Cow<'static, str>,
    payload: BeanInstance,
}

impl InstanceValue {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn payload(&self) -> &BeanInstance {
        &self.payload
    }
}

/// Dynamic value used for bean properties, constructor arguments and
/// configuration entries.
#[derive(Clone, Default)]
pub enum BeanValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<BeanValue>),
    Map(BTreeMap<String, BeanValue>),
    /// A live object (bean instance or converted value).
    Instance(InstanceValue),
    /// A deferred reference to a bean, usable before the bean finished
    /// creation (circular dependencies) or to delay creation entirely.
    Handle(BeanHandle),
}

impl BeanValue {
    /// Wraps a shared instance so that injection points asking for `Arc<T>`
    /// can extract it. `T` may be a trait object.
    pub fn wrap_shared<T>(instance: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        BeanValue::Instance(InstanceValue {
            type_id: TypeId::of::<T>(),
            type_name: Cow::Borrowed(std::any::type_name::<T>()),
            payload: Arc::new(instance),
        })
    }

    /// Wraps an owned object (e.g. an enum variant produced by a converter).
    pub fn wrap_object<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        BeanValue::Instance(InstanceValue {
            type_id: TypeId::of::<T>(),
            type_name: Cow::Borrowed(std::any::type_name::<T>()),
            payload: Arc::new(value),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BeanValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BeanValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BeanValue::Int(i) => Some(*i),
            BeanValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BeanValue::Float(f) => Some(*f),
            BeanValue::Int(i) => Some(*i as f64),
            BeanValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BeanValue::Bool(b) => Some(*b),
            BeanValue::Str(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Short tag for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BeanValue::Null => "null",
            BeanValue::Bool(_) => "bool",
            BeanValue::Int(_) => "int",
            BeanValue::Float(_) => "float",
            BeanValue::Str(_) => "string",
            BeanValue::List(_) => "list",
            BeanValue::Map(_) => "map",
            BeanValue::Instance(_) => "instance",
            BeanValue::Handle(_) => "handle",
        }
    }

    /// Describes the runtime type of this value for converter lookup.
    pub fn descriptor(&self) -> TypeDescriptor {
        match self {
            BeanValue::Null => TypeDescriptor::dynamic(),
            BeanValue::Bool(_) => TypeDescriptor::of::<bool>(),
            BeanValue::Int(_) => TypeDescriptor::of::<i64>(),
            BeanValue::Float(_) => TypeDescriptor::of::<f64>(),
            BeanValue::Str(_) => TypeDescriptor::of::<String>(),
            BeanValue::List(items) => TypeDescriptor::list(unified_descriptor(items.iter())),
            BeanValue::Map(entries) => TypeDescriptor::map(
                TypeDescriptor::of::<String>(),
                unified_descriptor(entries.values()),
            ),
            BeanValue::Instance(iv) => {
                TypeDescriptor::named(iv.type_id, iv.type_name.clone())
            }
            BeanValue::Handle(_) => TypeDescriptor::of::<BeanHandle>(),
        }
    }

    /// Extracts an owned object previously stored via [`wrap_object`].
    ///
    /// [`wrap_object`]: BeanValue::wrap_object
    pub fn extract_object<T: Clone + Send + Sync + 'static>(&self) -> Result<T, ConversionError> {
        match self {
            BeanValue::Instance(iv) => {
                iv.payload.downcast_ref::<T>().cloned().ok_or_else(|| {
                    ConversionError::Extraction {
                        value_kind: "instance",
                        target_type: std::any::type_name::<T>().to_string(),
                    }
                })
            }
            other => Err(ConversionError::Extraction {
                value_kind: other.kind_name(),
                target_type: std::any::type_name::<T>().to_string(),
            }),
        }
    }
}

/// Element descriptor for homogeneous containers; mixed or empty containers
/// report a dynamic element type.
fn unified_descriptor<'a>(mut values: impl Iterator<Item = &'a BeanValue>) -> TypeDescriptor {
    let first = match values.next() {
        Some(v) => v.descriptor(),
        None => return TypeDescriptor::dynamic(),
    };
    for v in values {
        if v.descriptor() != first {
            return TypeDescriptor::dynamic();
        }
    }
    first
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanValue::Null => write!(f, "Null"),
            BeanValue::Bool(b) => write!(f, "Bool({b})"),
            BeanValue::Int(i) => write!(f, "Int({i})"),
            BeanValue::Float(v) => write!(f, "Float({v})"),
            BeanValue::Str(s) => write!(f, "Str({s:?})"),
            BeanValue::List(items) => f.debug_tuple("List").field(items).finish(),
            BeanValue::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            BeanValue::Instance(iv) => write!(f, "Instance({})", iv.type_name),
            BeanValue::Handle(h) => write!(f, "Handle({})", h.bean_name()),
        }
    }
}

impl fmt::Display for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanValue::Null => write!(f, "null"),
            BeanValue::Bool(b) => write!(f, "{b}"),
            BeanValue::Int(i) => write!(f, "{i}"),
            BeanValue::Float(v) => write!(f, "{v}"),
            BeanValue::Str(s) => write!(f, "{s}"),
            BeanValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(","))
            }
            BeanValue::Map(entries) => write!(f, "<map of {} entries>", entries.len()),
            BeanValue::Instance(iv) => write!(f, "<{}>", iv.type_name),
            BeanValue::Handle(h) => write!(f, "<handle to '{}'>", h.bean_name()),
        }
    }
}

impl From<&str> for BeanValue {
    fn from(s: &str) -> Self {
        BeanValue::Str(s.to_string())
    }
}

impl From<String> for BeanValue {
    fn from(s: String) -> Self {
        BeanValue::Str(s)
    }
}

impl From<i64> for BeanValue {
    fn from(i: i64) -> Self {
        BeanValue::Int(i)
    }
}

impl From<f64> for BeanValue {
    fn from(v: f64) -> Self {
        BeanValue::Float(v)
    }
}

impl From<bool> for BeanValue {
    fn from(b: bool) -> Self {
        BeanValue::Bool(b)
    }
}

/// Extraction of a canonical [`BeanValue`] into a concrete Rust value.
///
/// The conversion service is responsible for producing canonical shapes
/// (range-checked integers, split lists, resolved instances); implementations
/// of this trait only unwrap them. User enums participating in conversion
/// implement this by delegating to [`BeanValue::extract_object`].
pub trait FromBeanValue: Sized + 'static {
    /// The descriptor of the target type, used to drive conversion and
    /// dependency resolution for injection points of this type.
    fn value_descriptor() -> TypeDescriptor;

    fn from_value(value: BeanValue) -> Result<Self, ConversionError>;
}

fn extraction<T>(value: &BeanValue) -> ConversionError {
    ConversionError::Extraction {
        value_kind: value.kind_name(),
        target_type: std::any::type_name::<T>().to_string(),
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(impl FromBeanValue for $ty {
            fn value_descriptor() -> TypeDescriptor {
                TypeDescriptor::of::<$ty>()
            }

            fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
                match value {
                    BeanValue::Int(i) => {
                        <$ty>::try_from(i).map_err(|_| ConversionError::NumericOverflow {
                            value: i.to_string(),
                            target_type: std::any::type_name::<$ty>().to_string(),
                        })
                    }
                    other => Err(extraction::<$ty>(&other)),
                }
            }
        })*
    };
}

impl_from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl FromBeanValue for f64 {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<f64>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Float(v) => Ok(v),
            BeanValue::Int(i) => Ok(i as f64),
            other => Err(extraction::<f64>(&other)),
        }
    }
}

impl FromBeanValue for f32 {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<f32>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromBeanValue for bool {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<bool>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Bool(b) => Ok(b),
            other => Err(extraction::<bool>(&other)),
        }
    }
}

impl FromBeanValue for String {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<String>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Str(s) => Ok(s),
            other => Err(extraction::<String>(&other)),
        }
    }
}

impl FromBeanValue for char {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<char>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(ConversionError::failed(s, "String", "char", "expected exactly one character")),
                }
            }
            other => Err(extraction::<char>(&other)),
        }
    }
}

impl FromBeanValue for PathBuf {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<PathBuf>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Str(s) => Ok(PathBuf::from(s)),
            other => other.extract_object::<PathBuf>(),
        }
    }
}

impl FromBeanValue for BeanValue {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::dynamic()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl FromBeanValue for BeanHandle {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<BeanHandle>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Handle(h) => Ok(h),
            other => Err(extraction::<BeanHandle>(&other)),
        }
    }
}

impl<P: FromBeanValue> FromBeanValue for Option<P> {
    fn value_descriptor() -> TypeDescriptor {
        P::value_descriptor()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Null => Ok(None),
            other => P::from_value(other).map(Some),
        }
    }
}

impl<P: FromBeanValue> FromBeanValue for Vec<P> {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::list_with_id(TypeId::of::<Vec<P>>(), P::value_descriptor())
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::List(items) => items.into_iter().map(P::from_value).collect(),
            other => Err(extraction::<Vec<P>>(&other)),
        }
    }
}

impl<P: FromBeanValue> FromBeanValue for BTreeMap<String, P> {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::map_with_id(
            TypeId::of::<BTreeMap<String, P>>(),
            TypeDescriptor::of::<String>(),
            P::value_descriptor(),
        )
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| P::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(extraction::<BTreeMap<String, P>>(&other)),
        }
    }
}

impl<P: FromBeanValue> FromBeanValue for std::collections::HashMap<String, P> {
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::map_with_id(
            TypeId::of::<std::collections::HashMap<String, P>>(),
            TypeDescriptor::of::<String>(),
            P::value_descriptor(),
        )
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| P::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(extraction::<std::collections::HashMap<String, P>>(&other)),
        }
    }
}

/// Shared references inject by their logical type `T`, which may be a trait
/// object. The descriptor deliberately names `T` rather than `Arc<T>`: the
/// dependency resolver searches candidates by the provided type.
impl<T> FromBeanValue for Arc<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    fn value_descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<T>()
    }

    fn from_value(value: BeanValue) -> Result<Self, ConversionError> {
        match value {
            BeanValue::Instance(iv) => iv
                .payload
                .downcast_ref::<Arc<T>>()
                .cloned()
                .ok_or(ConversionError::Extraction {
                    value_kind: "instance",
                    target_type: std::any::type_name::<Arc<T>>().to_string(),
                }),
            other => Err(ConversionError::Extraction {
                value_kind: other.kind_name(),
                target_type: std::any::type_name::<Arc<T>>().to_string(),
            }),
        }
    }
}
