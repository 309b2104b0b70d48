// wisteria-core: an inversion-of-control container
//
// Beans are described by declarative definitions and runtime class metadata,
// created through a post-processor pipeline and cached per scope:
// - singleton and prototype scopes, plus custom scope strategies
// - constructor, by-name and by-type autowiring
// - lifecycle management (init/destroy callbacks, ordered destruction)
// - type conversion between declared values and bean properties

pub mod bean;
pub mod class;
pub mod config;
pub mod convert;
pub mod error;
pub mod factory;
pub mod logging;
pub mod processor;
pub mod resolver;
pub mod scope;
pub mod singleton;
pub mod utils;
pub mod value;

// 重新导出常用类型
pub use bean::{
    AutowireMode, BeanDefinition, BeanDefinitionHolder, BeanReference, ConstructorArgumentValues,
    DependencyCheck, MergedBeanDefinition, PropertyValue, PropertyValues, ValueHolder, ValueSource,
};
pub use class::{
    ArgList, BeanClass, BeanClassBuilder, BeanObject, ClassRegistry, ConstructorSpec,
    FactoryMethodSpec, ParamSpec, PropertySpec,
};
pub use config::{
    Environment, EnvPropertySource, MapPropertySource, PropertySource, TomlPropertySource,
};
pub use convert::{
    ConversionService, ConvertiblePair, ConvertibleType, Converter, DefaultConversionService,
    EnumConverter, TypeDescriptor, TypeKind,
};
pub use error::{ContainerError, ContainerResult, ConversionError};
pub use factory::{
    BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use processor::{BeanPostProcessor, PropertyDecision};
pub use resolver::{Candidate, DependencyDescriptor, DependencyShape};
pub use scope::{BeanScope, ScopeStrategy};
pub use singleton::{BeanHandle, RegisteredSingleton, SingletonRegistry};
pub use value::{BeanInstance, BeanValue, FromBeanValue};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean::{
        AutowireMode, BeanDefinition, BeanReference, DependencyCheck, PropertyValues, ValueHolder,
    };
    pub use crate::class::{ArgList, BeanClass, BeanClassBuilder, ParamSpec};
    pub use crate::config::{
        self, Environment, EnvPropertySource, MapPropertySource, PropertySource,
        TomlPropertySource,
    };
    pub use crate::convert::{ConversionService, Converter, TypeDescriptor};
    pub use crate::error::{ContainerError, ContainerResult};
    pub use crate::factory::{
        BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
        DefaultListableBeanFactory, ListableBeanFactory,
    };
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::processor::{BeanPostProcessor, PropertyDecision};
    pub use crate::scope::{BeanScope, ScopeStrategy};
    pub use crate::singleton::BeanHandle;
    pub use crate::utils;
    pub use crate::value::{BeanValue, FromBeanValue};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
