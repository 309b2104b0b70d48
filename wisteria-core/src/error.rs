//! Error types for the container.
//!
//! Creation-time failures are never silently swallowed (destruction is the one
//! exception, where per-bean errors are logged so teardown can proceed). Every
//! variant carries enough context to act on: the offending bean name, the
//! declared type, and for ambiguity errors the full candidate list.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors raised by the bean factory and its collaborators.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// No bean definition is registered under the requested name.
    #[error("no bean definition found for name '{0}'")]
    NoSuchBeanDefinition(String),

    /// The requested name resolves to an abstract definition.
    #[error("bean definition '{0}' is abstract and cannot be instantiated")]
    AbstractDefinition(String),

    /// A definition could not be merged or resolved (e.g. missing parent).
    #[error("bean definition store error for '{name}': {message}")]
    DefinitionStore { name: String, message: String },

    /// No `BeanClass` has been registered for the definition's type.
    #[error("no bean class registered for type '{0}'")]
    NoSuchBeanClass(String),

    /// No constructor of the bean class could be satisfied.
    #[error("no satisfiable constructor found for bean '{name}' of type '{type_name}'")]
    NoSatisfiableConstructor { name: String, type_name: String },

    /// Several equally-greedy constructors are satisfiable and cannot be
    /// told apart.
    #[error(
        "ambiguous constructor resolution for bean '{name}': \
         {count} candidates with {params} parameter(s) are equally satisfiable"
    )]
    AmbiguousConstructor {
        name: String,
        params: usize,
        count: usize,
    },

    /// The constructor or factory method itself failed.
    #[error("instantiation of bean '{name}' failed: {source}")]
    InstantiationFailed {
        name: String,
        source: anyhow::Error,
    },

    /// A required dependency has zero candidates.
    #[error("no matching bean of type '{type_name}' found for dependency of bean '{requester}'")]
    NoMatchingBean {
        requester: String,
        type_name: String,
    },

    /// A required dependency has several candidates and no way to pick one.
    #[error(
        "multiple matching beans of type '{type_name}' found for bean '{requester}': \
         {candidates:?}; mark one as primary or disambiguate the injection point"
    )]
    AmbiguousDependency {
        requester: String,
        type_name: String,
        candidates: Vec<String>,
    },

    /// A cycle was detected that cannot be resolved via an early reference.
    #[error("circular dependency detected while creating bean '{name}' (in creation: {chain:?})")]
    CircularDependency { name: String, chain: Vec<String> },

    /// Type conversion failed while populating a property or argument.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// An init or destroy method failed.
    #[error("lifecycle method '{method}' failed for bean '{name}': {source}")]
    LifecycleMethod {
        name: String,
        method: String,
        source: anyhow::Error,
    },

    /// The definition references a method the bean class does not declare.
    #[error("unknown method '{method}' on bean class '{type_name}'")]
    UnknownMethod { type_name: String, method: String },

    /// The definition references a property the bean class does not declare.
    #[error("property '{property}' is not declared on bean class '{type_name}'")]
    UnknownProperty {
        type_name: String,
        property: String,
    },

    /// A required property stayed unset after explicit values and autowiring.
    #[error("required property '{property}' of bean '{name}' was not satisfied after autowiring")]
    UnsatisfiedDependency { name: String, property: String },

    /// A different instance is already registered under this name.
    #[error("a different singleton instance is already registered under name '{0}'")]
    DuplicateSingleton(String),

    /// A bean exists but is not of the requested type.
    #[error("bean '{name}' is not of the requested type '{requested}'")]
    TypeMismatch { name: String, requested: String },

    /// The definition names a scope with no registered strategy.
    #[error("no scope strategy registered under name '{0}'")]
    UnknownScope(String),

    /// Definition mutation was attempted after `freeze_configuration`.
    #[error("configuration is frozen; bean definitions can no longer be modified")]
    FrozenConfiguration,

    /// An early reference was dereferenced before its bean finished creation
    /// and no factory is reachable to complete it.
    #[error("reference to bean '{0}' is not initialized yet")]
    HandleNotReady(String),

    /// Catch-all for user-supplied callbacks and extensions.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised by the type-conversion service.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// No converter chain accepts the source/target pair.
    #[error("no converter found for '{source_type}' -> '{target_type}'")]
    NoConverter {
        source_type: String,
        target_type: String,
    },

    /// A converter was found but failed for this particular value.
    #[error("failed to convert value '{value}' from '{source_type}' to '{target_type}': {reason}")]
    ConversionFailed {
        value: String,
        source_type: String,
        target_type: String,
        reason: String,
    },

    /// A narrowing numeric conversion would lose information.
    #[error("value '{value}' does not fit into numeric type '{target_type}'")]
    NumericOverflow { value: String, target_type: String },

    /// A string does not name any variant of the target enum.
    #[error("'{value}' is not a variant of '{target_type}'")]
    UnknownVariant { value: String, target_type: String },

    /// A canonical value could not be extracted into its Rust target type.
    #[error("cannot extract a '{target_type}' out of a {value_kind} value")]
    Extraction {
        value_kind: &'static str,
        target_type: String,
    },
}

impl ConversionError {
    pub(crate) fn failed(
        value: impl std::fmt::Display,
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConversionError::ConversionFailed {
            value: value.to_string(),
            source_type: source_type.into(),
            target_type: target_type.into(),
            reason: reason.into(),
        }
    }
}
