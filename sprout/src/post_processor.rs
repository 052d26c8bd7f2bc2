//! Hooks modifying component definitions before any component is created.

#[cfg(test)]
use mockall::automock;
pub use sprout_di::component_registry::ComponentDefinitionRegistry;
pub use sprout_di::instance_provider::ErrorPtr;
use std::sync::Arc;

pub type DefinitionPostProcessorPtr = Arc<dyn DefinitionPostProcessor + Send + Sync>;

/// Modifies registered definitions. Definition post-processors are run by the
/// [ApplicationContext](crate::application::ApplicationContext) on refresh, before any singleton
/// gets created, which makes them the place to add, replace or remove definitions.
#[cfg_attr(test, automock)]
pub trait DefinitionPostProcessor {
    fn post_process(&self, registry: &dyn ComponentDefinitionRegistry) -> Result<(), ErrorPtr>;

    /// Returns the order of this post-processor. Lower values get run first. Default 0.
    fn order(&self) -> i32 {
        0
    }
}
