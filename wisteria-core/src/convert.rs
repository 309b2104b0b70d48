//! Type conversion service backing property population.
//!
//! Converters are keyed by an ordered source/target pair and may additionally
//! be conditional: their `matches` predicate is consulted with full
//! [`TypeDescriptor`]s (including container element types) before selection.
//! Lookup order: exact-pair converters, then wildcard converters, then the
//! built-in container fallback (element-wise conversion, comma-delimited
//! string splitting/joining). A value whose descriptor already equals the
//! target is returned as-is, without allocating a fresh container.

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::value::BeanValue;

/// Describes a type in the conversion domain, including container element
/// types. Built at compile time through [`FromBeanValue`] implementations or
/// explicitly via the constructors here.
///
/// [`FromBeanValue`]: crate::value::FromBeanValue
#[derive(Clone)]
pub struct TypeDescriptor {
    id: TypeId,
    name: Cow<'static, str>,
    kind: TypeKind,
}

#[derive(Clone)]
pub enum TypeKind {
    Scalar,
    List(Box<TypeDescriptor>),
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    /// Matches any value; used for `BeanValue`-typed targets and unknown
    /// container elements.
    Dynamic,
}

impl TypeDescriptor {
    /// Scalar descriptor for a Rust type (possibly unsized, e.g. `dyn Trait`).
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeDescriptor {
            id: TypeId::of::<T>(),
            name: Cow::Borrowed(std::any::type_name::<T>()),
            kind: TypeKind::Scalar,
        }
    }

    /// Scalar descriptor with an explicit id and name (runtime instances).
    pub fn named(id: TypeId, name: impl Into<Cow<'static, str>>) -> Self {
        TypeDescriptor {
            id,
            name: name.into(),
            kind: TypeKind::Scalar,
        }
    }

    pub fn dynamic() -> Self {
        TypeDescriptor {
            id: TypeId::of::<BeanValue>(),
            name: Cow::Borrowed("value"),
            kind: TypeKind::Dynamic,
        }
    }

    /// List descriptor with a placeholder container id; used when only the
    /// element type is known at runtime.
    pub fn list(element: TypeDescriptor) -> Self {
        Self::list_with_id(TypeId::of::<Vec<BeanValue>>(), element)
    }

    pub fn list_with_id(id: TypeId, element: TypeDescriptor) -> Self {
        TypeDescriptor {
            id,
            name: Cow::Owned(format!("Vec<{}>", element.name)),
            kind: TypeKind::List(Box::new(element)),
        }
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::map_with_id(TypeId::of::<BeanValue>(), key, value)
    }

    pub fn map_with_id(id: TypeId, key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor {
            id,
            name: Cow::Owned(format!("Map<{}, {}>", key.name, value.name)),
            kind: TypeKind::Map(Box::new(key), Box::new(value)),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, TypeKind::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, TypeKind::Map(_, _))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, TypeKind::Dynamic)
    }

    /// Element descriptor of a list, or value descriptor of a map.
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match &self.kind {
            TypeKind::List(e) => Some(e),
            TypeKind::Map(_, v) => Some(v),
            _ => None,
        }
    }
}

/// Structural equality: containers compare by their element descriptors, not
/// by the (possibly placeholder) container id.
impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Scalar, TypeKind::Scalar) => self.id == other.id,
            (TypeKind::Dynamic, TypeKind::Dynamic) => true,
            (TypeKind::List(a), TypeKind::List(b)) => a == b,
            (TypeKind::Map(ak, av), TypeKind::Map(bk, bv)) => ak == bk && av == bv,
            _ => false,
        }
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({})", self.name)
    }
}

/// One side of a convertible pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ConvertibleType {
    Exact(TypeId),
    Any,
}

impl ConvertibleType {
    fn accepts(&self, id: TypeId) -> bool {
        match self {
            ConvertibleType::Exact(t) => *t == id,
            ConvertibleType::Any => true,
        }
    }
}

/// Ordered source/target pair a converter registers for. A pair with an
/// [`ConvertibleType::Any`] side is a general fallback and is consulted only
/// after all exact pairs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ConvertiblePair {
    pub source: ConvertibleType,
    pub target: ConvertibleType,
}

impl ConvertiblePair {
    pub fn exact<S: ?Sized + 'static, T: ?Sized + 'static>() -> Self {
        ConvertiblePair {
            source: ConvertibleType::Exact(TypeId::of::<S>()),
            target: ConvertibleType::Exact(TypeId::of::<T>()),
        }
    }

    fn is_exact(&self) -> bool {
        matches!(
            (self.source, self.target),
            (ConvertibleType::Exact(_), ConvertibleType::Exact(_))
        )
    }
}

/// A registered conversion between value types.
pub trait Converter: Send + Sync {
    /// Pairs this converter handles.
    fn convertible_pairs(&self) -> Vec<ConvertiblePair>;

    /// Conditional predicate evaluated with full descriptors before the
    /// converter is selected.
    fn matches(&self, _source: &TypeDescriptor, _target: &TypeDescriptor) -> bool {
        true
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError>;
}

/// Read-side of the conversion infrastructure.
pub trait ConversionService: Send + Sync {
    /// Whether some converter chain can perform the conversion. Consistent
    /// with [`convert_value`](ConversionService::convert_value): this never
    /// accepts a pair the service cannot actually convert.
    fn can_convert(&self, source: &TypeDescriptor, target: &TypeDescriptor) -> bool;

    fn convert_value(
        &self,
        value: BeanValue,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError>;
}

/// Default converter registry with the standard converter set installed.
pub struct DefaultConversionService {
    exact: HashMap<(TypeId, TypeId), Vec<Arc<dyn Converter>>>,
    wildcard: Vec<(ConvertiblePair, Arc<dyn Converter>)>,
}

impl DefaultConversionService {
    pub fn new() -> Self {
        let mut service = Self::empty();
        service.add_converter(Arc::new(NumericConverter));
        service.add_converter(Arc::new(StringToNumberConverter));
        service.add_converter(Arc::new(NumberToStringConverter));
        service.add_converter(Arc::new(StringToBooleanConverter));
        service.add_converter(Arc::new(BooleanToStringConverter));
        service.add_converter(Arc::new(StringToCharConverter));
        service.add_converter(Arc::new(StringToPathConverter));
        service
    }

    /// A service with no converters at all; identity and container fallbacks
    /// still apply.
    pub fn empty() -> Self {
        DefaultConversionService {
            exact: HashMap::new(),
            wildcard: Vec::new(),
        }
    }

    /// Registers a converter. Converters registered later take precedence
    /// over earlier ones for the same pair.
    pub fn add_converter(&mut self, converter: Arc<dyn Converter>) {
        for pair in converter.convertible_pairs() {
            if pair.is_exact() {
                if let (ConvertibleType::Exact(s), ConvertibleType::Exact(t)) =
                    (pair.source, pair.target)
                {
                    self.exact
                        .entry((s, t))
                        .or_default()
                        .insert(0, Arc::clone(&converter));
                }
            } else {
                self.wildcard.insert(0, (pair, Arc::clone(&converter)));
            }
        }
    }

    fn find_converter(
        &self,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Option<&Arc<dyn Converter>> {
        if let Some(chain) = self.exact.get(&(source.id(), target.id())) {
            if let Some(c) = chain.iter().find(|c| c.matches(source, target)) {
                return Some(c);
            }
        }
        self.wildcard
            .iter()
            .find(|(pair, c)| {
                pair.source.accepts(source.id())
                    && pair.target.accepts(target.id())
                    && c.matches(source, target)
            })
            .map(|(_, c)| c)
    }

    fn convert_container(
        &self,
        value: BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        match target.kind() {
            TypeKind::List(element) => match value {
                BeanValue::List(items) => {
                    let converted: Result<Vec<_>, _> = items
                        .into_iter()
                        .map(|item| self.convert_value(item, element))
                        .collect();
                    Ok(BeanValue::List(converted?))
                }
                BeanValue::Str(s) => {
                    // Comma-delimited with per-element trimming; an empty
                    // string yields an empty container, not null.
                    if s.trim().is_empty() {
                        return Ok(BeanValue::List(Vec::new()));
                    }
                    let converted: Result<Vec<_>, _> = s
                        .split(',')
                        .map(|piece| {
                            self.convert_value(BeanValue::Str(piece.trim().to_string()), element)
                        })
                        .collect();
                    Ok(BeanValue::List(converted?))
                }
                single => {
                    let converted = self.convert_value(single, element)?;
                    Ok(BeanValue::List(vec![converted]))
                }
            },
            TypeKind::Map(_, value_type) => match value {
                BeanValue::Map(entries) => {
                    let converted: Result<_, ConversionError> = entries
                        .into_iter()
                        .map(|(k, v)| self.convert_value(v, value_type).map(|v| (k, v)))
                        .collect();
                    Ok(BeanValue::Map(converted?))
                }
                other => Err(no_converter(source, target, &other)),
            },
            TypeKind::Scalar if target.id() == TypeId::of::<String>() => match value {
                BeanValue::List(items) => {
                    let string_target = TypeDescriptor::of::<String>();
                    let pieces: Result<Vec<_>, _> = items
                        .into_iter()
                        .map(|item| {
                            self.convert_value(item, &string_target).map(|v| match v {
                                BeanValue::Str(s) => s,
                                other => other.to_string(),
                            })
                        })
                        .collect();
                    Ok(BeanValue::Str(pieces?.join(",")))
                }
                other => Err(no_converter(source, target, &other)),
            },
            _ => Err(no_converter(source, target, &value)),
        }
    }
}

fn no_converter(
    source: &TypeDescriptor,
    target: &TypeDescriptor,
    _value: &BeanValue,
) -> ConversionError {
    ConversionError::NoConverter {
        source_type: source.name().to_string(),
        target_type: target.name().to_string(),
    }
}

impl Default for DefaultConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionService for DefaultConversionService {
    fn can_convert(&self, source: &TypeDescriptor, target: &TypeDescriptor) -> bool {
        if target.is_dynamic() || source.is_dynamic() || source == target {
            return true;
        }
        if self.find_converter(source, target).is_some() {
            return true;
        }
        match target.kind() {
            TypeKind::List(element) => match source.kind() {
                TypeKind::List(source_element) => self.can_convert(source_element, element),
                _ => self.can_convert(source, element),
            },
            TypeKind::Map(_, value_type) => match source.kind() {
                TypeKind::Map(_, source_value) => self.can_convert(source_value, value_type),
                _ => false,
            },
            TypeKind::Scalar if target.id() == TypeId::of::<String>() => match source.kind() {
                TypeKind::List(source_element) => {
                    self.can_convert(source_element, &TypeDescriptor::of::<String>())
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn convert_value(
        &self,
        value: BeanValue,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        // Null converts to null for any target.
        if value.is_null() || target.is_dynamic() {
            return Ok(value);
        }
        let source = value.descriptor();
        // Identity: also covers containers whose element descriptors already
        // match the target's, which are passed through untouched.
        if source == *target {
            return Ok(value);
        }
        if let Some(converter) = self.find_converter(&source, target) {
            return converter.convert(&value, &source, target);
        }
        self.convert_container(value, &source, target)
    }
}

// ---------------------------------------------------------------------------
// default converters
// ---------------------------------------------------------------------------

const INT_TARGETS: &[fn() -> TypeId] = &[
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
];

fn int_bounds(target: TypeId) -> Option<(i64, i64)> {
    if target == TypeId::of::<i8>() {
        Some((i8::MIN as i64, i8::MAX as i64))
    } else if target == TypeId::of::<i16>() {
        Some((i16::MIN as i64, i16::MAX as i64))
    } else if target == TypeId::of::<i32>() {
        Some((i32::MIN as i64, i32::MAX as i64))
    } else if target == TypeId::of::<i64>() || target == TypeId::of::<isize>() {
        Some((i64::MIN, i64::MAX))
    } else if target == TypeId::of::<u8>() {
        Some((0, u8::MAX as i64))
    } else if target == TypeId::of::<u16>() {
        Some((0, u16::MAX as i64))
    } else if target == TypeId::of::<u32>() {
        Some((0, u32::MAX as i64))
    } else if target == TypeId::of::<u64>() || target == TypeId::of::<usize>() {
        // canonical integers are i64, so i64::MAX is the representable cap
        Some((0, i64::MAX))
    } else {
        None
    }
}

fn is_float_target(target: TypeId) -> bool {
    target == TypeId::of::<f32>() || target == TypeId::of::<f64>()
}

fn checked_int(value: i64, target: &TypeDescriptor) -> Result<BeanValue, ConversionError> {
    match int_bounds(target.id()) {
        Some((min, max)) if value >= min && value <= max => Ok(BeanValue::Int(value)),
        _ => Err(ConversionError::NumericOverflow {
            value: value.to_string(),
            target_type: target.name().to_string(),
        }),
    }
}

fn checked_float(value: f64, target: &TypeDescriptor) -> Result<BeanValue, ConversionError> {
    if target.id() == TypeId::of::<f32>() && value.is_finite() && value.abs() > f32::MAX as f64 {
        return Err(ConversionError::NumericOverflow {
            value: value.to_string(),
            target_type: target.name().to_string(),
        });
    }
    Ok(BeanValue::Float(value))
}

/// Numeric widening and checked narrowing between the canonical `i64`/`f64`
/// value representation and every primitive numeric target. Out-of-range
/// values raise instead of truncating silently.
struct NumericConverter;

impl Converter for NumericConverter {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        let mut pairs = Vec::new();
        for source in [TypeId::of::<i64>(), TypeId::of::<f64>()] {
            for target in INT_TARGETS.iter().map(|f| f()) {
                pairs.push(ConvertiblePair {
                    source: ConvertibleType::Exact(source),
                    target: ConvertibleType::Exact(target),
                });
            }
            for target in [TypeId::of::<f32>(), TypeId::of::<f64>()] {
                pairs.push(ConvertiblePair {
                    source: ConvertibleType::Exact(source),
                    target: ConvertibleType::Exact(target),
                });
            }
        }
        pairs
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        if is_float_target(target.id()) {
            let v = value.as_f64().ok_or_else(|| {
                ConversionError::failed(value, source.name(), target.name(), "not numeric")
            })?;
            return checked_float(v, target);
        }
        match value {
            BeanValue::Int(i) => checked_int(*i, target),
            BeanValue::Float(f) => {
                // Fractional values do not narrow to integers silently.
                if f.fract() != 0.0 || *f < i64::MIN as f64 || *f > i64::MAX as f64 {
                    Err(ConversionError::NumericOverflow {
                        value: f.to_string(),
                        target_type: target.name().to_string(),
                    })
                } else {
                    checked_int(*f as i64, target)
                }
            }
            other => Err(ConversionError::failed(
                other,
                source.name(),
                target.name(),
                "not numeric",
            )),
        }
    }
}

/// Parses trimmed decimal strings into numbers, range-checked per target.
struct StringToNumberConverter;

impl Converter for StringToNumberConverter {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        let mut pairs: Vec<ConvertiblePair> = INT_TARGETS
            .iter()
            .map(|f| ConvertiblePair {
                source: ConvertibleType::Exact(TypeId::of::<String>()),
                target: ConvertibleType::Exact(f()),
            })
            .collect();
        for target in [TypeId::of::<f32>(), TypeId::of::<f64>()] {
            pairs.push(ConvertiblePair {
                source: ConvertibleType::Exact(TypeId::of::<String>()),
                target: ConvertibleType::Exact(target),
            });
        }
        pairs
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        let text = value
            .as_str()
            .ok_or_else(|| {
                ConversionError::failed(value, source.name(), target.name(), "not a string")
            })?
            .trim();
        if is_float_target(target.id()) {
            let parsed: f64 = text.parse().map_err(|_| {
                ConversionError::failed(text, source.name(), target.name(), "invalid number")
            })?;
            checked_float(parsed, target)
        } else {
            let parsed: i64 = text.parse().map_err(|_| {
                ConversionError::failed(text, source.name(), target.name(), "invalid integer")
            })?;
            checked_int(parsed, target)
        }
    }
}

struct NumberToStringConverter;

impl Converter for NumberToStringConverter {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        vec![
            ConvertiblePair::exact::<i64, String>(),
            ConvertiblePair::exact::<f64, String>(),
        ]
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        match value {
            BeanValue::Int(i) => Ok(BeanValue::Str(i.to_string())),
            BeanValue::Float(f) => Ok(BeanValue::Str(f.to_string())),
            other => Err(ConversionError::failed(
                other,
                source.name(),
                target.name(),
                "not numeric",
            )),
        }
    }
}

/// Accepts `true/yes/1` and `false/no/0`, case-insensitively.
struct StringToBooleanConverter;

impl Converter for StringToBooleanConverter {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        vec![ConvertiblePair::exact::<String, bool>()]
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        value.as_bool().map(BeanValue::Bool).ok_or_else(|| {
            ConversionError::failed(value, source.name(), target.name(), "not a boolean")
        })
    }
}

struct BooleanToStringConverter;

impl Converter for BooleanToStringConverter {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        vec![ConvertiblePair::exact::<bool, String>()]
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        match value {
            BeanValue::Bool(b) => Ok(BeanValue::Str(b.to_string())),
            other => Err(ConversionError::failed(
                other,
                source.name(),
                target.name(),
                "not a boolean",
            )),
        }
    }
}

struct StringToCharConverter;

impl Converter for StringToCharConverter {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        vec![ConvertiblePair::exact::<String, char>()]
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        match value {
            BeanValue::Str(s) if s.chars().count() == 1 => Ok(BeanValue::Str(s.clone())),
            other => Err(ConversionError::failed(
                other,
                source.name(),
                target.name(),
                "expected exactly one character",
            )),
        }
    }
}

struct StringToPathConverter;

impl Converter for StringToPathConverter {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        vec![ConvertiblePair::exact::<String, PathBuf>()]
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        match value {
            BeanValue::Str(s) => Ok(BeanValue::wrap_object(PathBuf::from(s))),
            other => Err(ConversionError::failed(
                other,
                source.name(),
                target.name(),
                "not a string",
            )),
        }
    }
}

/// Bidirectional string/enum conversion built from a name table.
///
/// String lookup is exact and case-sensitive; a blank string converts to null
/// (the reset-to-absent convention) rather than failing.
pub struct EnumConverter<T> {
    entries: Vec<(&'static str, T)>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> EnumConverter<T> {
    pub fn new(entries: Vec<(&'static str, T)>) -> Self {
        EnumConverter { entries }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Converter for EnumConverter<T> {
    fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
        vec![
            ConvertiblePair::exact::<String, T>(),
            ConvertiblePair::exact::<T, String>(),
        ]
    }

    fn convert(
        &self,
        value: &BeanValue,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Result<BeanValue, ConversionError> {
        if target.id() == TypeId::of::<T>() {
            let text = value.as_str().ok_or_else(|| {
                ConversionError::failed(value, source.name(), target.name(), "not a string")
            })?;
            if text.trim().is_empty() {
                return Ok(BeanValue::Null);
            }
            return self
                .entries
                .iter()
                .find(|(name, _)| *name == text)
                .map(|(_, variant)| BeanValue::wrap_object(variant.clone()))
                .ok_or_else(|| ConversionError::UnknownVariant {
                    value: text.to_string(),
                    target_type: std::any::type_name::<T>().to_string(),
                });
        }
        let variant = value.extract_object::<T>()?;
        self.entries
            .iter()
            .find(|(_, v)| *v == variant)
            .map(|(name, _)| BeanValue::Str((*name).to_string()))
            .ok_or_else(|| ConversionError::UnknownVariant {
                value: "<unnamed variant>".to_string(),
                target_type: std::any::type_name::<T>().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FromBeanValue;

    #[derive(Clone, PartialEq, Debug)]
    enum Color {
        Red,
        Green,
        Blue,
    }

    fn color_service() -> DefaultConversionService {
        let mut service = DefaultConversionService::new();
        service.add_converter(Arc::new(EnumConverter::new(vec![
            ("Red", Color::Red),
            ("Green", Color::Green),
            ("Blue", Color::Blue),
        ])));
        service
    }

    #[test]
    fn test_null_converts_to_null() {
        let service = DefaultConversionService::new();
        let out = service
            .convert_value(BeanValue::Null, &TypeDescriptor::of::<i32>())
            .unwrap();
        assert!(out.is_null());
    }

    #[test]
    fn test_numeric_narrowing_rejects_overflow() {
        let service = DefaultConversionService::new();
        assert!(matches!(
            service.convert_value(BeanValue::Int(300), &TypeDescriptor::of::<u8>()),
            Err(ConversionError::NumericOverflow { .. })
        ));
        assert!(matches!(
            service.convert_value(BeanValue::Int(-1), &TypeDescriptor::of::<u32>()),
            Err(ConversionError::NumericOverflow { .. })
        ));
        let ok = service
            .convert_value(BeanValue::Int(127), &TypeDescriptor::of::<i8>())
            .unwrap();
        assert_eq!(ok.as_i64(), Some(127));
    }

    #[test]
    fn test_fractional_float_does_not_narrow() {
        let service = DefaultConversionService::new();
        assert!(service
            .convert_value(BeanValue::Float(1.5), &TypeDescriptor::of::<i32>())
            .is_err());
        let whole = service
            .convert_value(BeanValue::Float(4.0), &TypeDescriptor::of::<i32>())
            .unwrap();
        assert_eq!(whole.as_i64(), Some(4));
    }

    #[test]
    fn test_string_number_round_trip() {
        let service = DefaultConversionService::new();
        let n = service
            .convert_value(BeanValue::Str("42".into()), &TypeDescriptor::of::<i32>())
            .unwrap();
        assert_eq!(n.as_i64(), Some(42));
        let s = service
            .convert_value(BeanValue::Int(42), &TypeDescriptor::of::<String>())
            .unwrap();
        assert_eq!(s.as_str(), Some("42"));
    }

    #[test]
    fn test_enum_round_trip_and_blank_reset() {
        let service = color_service();
        let green = service
            .convert_value(BeanValue::Str("Green".into()), &TypeDescriptor::of::<Color>())
            .unwrap();
        assert_eq!(green.extract_object::<Color>().unwrap(), Color::Green);

        let name = service
            .convert_value(green, &TypeDescriptor::of::<String>())
            .unwrap();
        assert_eq!(name.as_str(), Some("Green"));

        // blank string resets to absent
        let blank = service
            .convert_value(BeanValue::Str("  ".into()), &TypeDescriptor::of::<Color>())
            .unwrap();
        assert!(blank.is_null());

        // lookup is case-sensitive
        assert!(matches!(
            service.convert_value(BeanValue::Str("green".into()), &TypeDescriptor::of::<Color>()),
            Err(ConversionError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_can_convert_consistent_with_convert() {
        let service = color_service();
        let string = TypeDescriptor::of::<String>();
        let color = TypeDescriptor::of::<Color>();
        assert!(service.can_convert(&string, &color));
        assert!(service.can_convert(&color, &string));
        assert!(!service.can_convert(&TypeDescriptor::of::<bool>(), &color));
        assert!(service
            .convert_value(BeanValue::Bool(true), &color)
            .is_err());
    }

    #[test]
    fn test_string_converts_to_path() {
        let service = DefaultConversionService::new();
        let out = service
            .convert_value(
                BeanValue::Str("/var/lib/wisteria".into()),
                &TypeDescriptor::of::<PathBuf>(),
            )
            .unwrap();
        let path = PathBuf::from_value(out).unwrap();
        assert_eq!(path, PathBuf::from("/var/lib/wisteria"));
    }

    #[test]
    fn test_string_splits_into_list_with_trimming() {
        let service = DefaultConversionService::new();
        let target = Vec::<String>::value_descriptor();
        let out = service
            .convert_value(BeanValue::Str("a, b ,c".into()), &target)
            .unwrap();
        match out {
            BeanValue::List(items) => {
                let strings: Vec<_> = items.iter().filter_map(|v| v.as_str()).collect();
                assert_eq!(strings, vec!["a", "b", "c"]);
            }
            other => panic!("expected list, got {other:?}"),
        }

        // empty string converts to an empty container, not null
        let empty = service
            .convert_value(BeanValue::Str(String::new()), &target)
            .unwrap();
        assert!(matches!(empty, BeanValue::List(items) if items.is_empty()));
    }

    #[test]
    fn test_list_joins_into_string() {
        let service = DefaultConversionService::new();
        let list = BeanValue::List(vec![BeanValue::Int(1), BeanValue::Int(2)]);
        let out = service
            .convert_value(list, &TypeDescriptor::of::<String>())
            .unwrap();
        assert_eq!(out.as_str(), Some("1,2"));
    }

    #[test]
    fn test_same_typed_collection_is_returned_as_is() {
        let service = DefaultConversionService::new();
        let items = vec![BeanValue::Str("x".into()), BeanValue::Str("y".into())];
        let buffer_ptr = items.as_ptr();
        let out = service
            .convert_value(BeanValue::List(items), &Vec::<String>::value_descriptor())
            .unwrap();
        match out {
            BeanValue::List(items) => assert_eq!(items.as_ptr(), buffer_ptr),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_element_wise_conversion_preserves_order() {
        let service = DefaultConversionService::new();
        let source = BeanValue::List(vec![
            BeanValue::Str("3".into()),
            BeanValue::Str("1".into()),
            BeanValue::Str("2".into()),
        ]);
        let out = service
            .convert_value(source, &Vec::<i32>::value_descriptor())
            .unwrap();
        let ints = Vec::<i32>::from_value(out).unwrap();
        assert_eq!(ints, vec![3, 1, 2]);
    }

    #[test]
    fn test_later_converters_take_precedence() {
        struct FortyTwo;
        impl Converter for FortyTwo {
            fn convertible_pairs(&self) -> Vec<ConvertiblePair> {
                vec![ConvertiblePair::exact::<String, i32>()]
            }

            fn convert(
                &self,
                _value: &BeanValue,
                _source: &TypeDescriptor,
                _target: &TypeDescriptor,
            ) -> Result<BeanValue, ConversionError> {
                Ok(BeanValue::Int(42))
            }
        }

        let mut service = DefaultConversionService::new();
        service.add_converter(Arc::new(FortyTwo));
        let out = service
            .convert_value(BeanValue::Str("7".into()), &TypeDescriptor::of::<i32>())
            .unwrap();
        assert_eq!(out.as_i64(), Some(42));
    }
}
