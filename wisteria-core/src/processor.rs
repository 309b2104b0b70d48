//! Bean post-processing hooks.
//!
//! Post-processors observe and modify beans at fixed points of the creation
//! pipeline. All hooks have pass-through defaults, so implementations only
//! override the stages they care about. Processors run in ascending
//! [`order`](BeanPostProcessor::order); ties run in registration order.

use std::any::Any;

use crate::bean::PropertyValues;
use crate::class::BeanClass;
use crate::error::ContainerResult;
use crate::value::BeanInstance;

/// Outcome of the property-processing stage.
pub enum PropertyDecision {
    /// Continue with these (possibly rewritten) property values.
    Proceed(PropertyValues),
    /// Skip applying property values entirely; later processors are not
    /// consulted for this bean.
    SkipApply,
}

/// Hook into the bean creation and destruction pipeline.
pub trait BeanPostProcessor: Send + Sync {
    /// Runs before the container instantiates the bean. Returning an
    /// instance short-circuits creation: the standard pipeline is skipped
    /// and only [`after_initialization`](Self::after_initialization) runs.
    fn before_instantiation(
        &self,
        _class: &BeanClass,
        _bean_name: &str,
    ) -> ContainerResult<Option<BeanInstance>> {
        Ok(None)
    }

    /// Runs right after instantiation, before any property population.
    /// Returning `false` stops property population for this bean and skips
    /// the remaining processors for this stage.
    fn after_instantiation(
        &self,
        _bean: &mut dyn Any,
        _bean_name: &str,
    ) -> ContainerResult<bool> {
        Ok(true)
    }

    /// Inspects or rewrites property values before they are applied.
    fn process_properties(
        &self,
        values: PropertyValues,
        _bean: &mut dyn Any,
        _bean_name: &str,
    ) -> ContainerResult<PropertyDecision> {
        Ok(PropertyDecision::Proceed(values))
    }

    /// Runs before init callbacks; may replace the instance.
    fn before_initialization(
        &self,
        bean: BeanInstance,
        _bean_name: &str,
    ) -> ContainerResult<BeanInstance> {
        Ok(bean)
    }

    /// Runs after init callbacks; may replace the instance. This is the last
    /// word on what gets cached and injected.
    fn after_initialization(
        &self,
        bean: BeanInstance,
        _bean_name: &str,
    ) -> ContainerResult<BeanInstance> {
        Ok(bean)
    }

    /// Whether this processor wants a destruction callback for the bean.
    fn requires_destruction(&self, _bean: &BeanInstance, _bean_name: &str) -> bool {
        false
    }

    /// Runs before the container destroys the bean.
    fn before_destruction(&self, _bean: &BeanInstance, _bean_name: &str) -> ContainerResult<()> {
        Ok(())
    }

    /// Pipeline position; lower runs earlier.
    fn order(&self) -> i32 {
        1000
    }

    fn processor_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;
    impl BeanPostProcessor for Passthrough {}

    #[test]
    fn test_defaults_pass_through() {
        let p = Passthrough;
        let values = PropertyValues::new();
        assert!(matches!(
            p.process_properties(values, &mut (), "bean").unwrap(),
            PropertyDecision::Proceed(_)
        ));
        assert!(p.after_instantiation(&mut (), "bean").unwrap());
        assert_eq!(p.order(), 1000);
    }
}
