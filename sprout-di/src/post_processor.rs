//! Hooks intercepting component initialization.

use crate::instance_provider::{ComponentInstanceAnyPtr, ErrorPtr};
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

pub type ComponentPostProcessorPtr = Arc<dyn ComponentPostProcessor + Send + Sync>;

/// Intercepts every created component around its initialization callbacks. Post-processors can
/// replace the instance they get (e.g. with a wrapper), which is then passed to the next one in
/// chain. Returning `None` stops the chain and keeps the current instance.
#[cfg_attr(test, automock)]
pub trait ComponentPostProcessor {
    /// Called after properties are set, but before any initialization callback.
    fn before_initialization(
        &self,
        instance: ComponentInstanceAnyPtr,
        _name: &str,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        Ok(Some(instance))
    }

    /// Called after all initialization callbacks.
    fn after_initialization(
        &self,
        instance: ComponentInstanceAnyPtr,
        _name: &str,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        Ok(Some(instance))
    }

    /// Returns the order of this post-processor. Lower values get run first. Default 0.
    fn order(&self) -> i32 {
        0
    }
}
