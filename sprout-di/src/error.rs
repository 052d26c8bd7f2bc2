use crate::instance_provider::ErrorPtr;
use itertools::Itertools;
use thiserror::Error;

/// Errors related to creating and managing components.
#[derive(Error, Clone, Debug)]
pub enum ComponentInstanceProviderError {
    #[error("Cannot find a definition for component: {0}")]
    NoSuchDefinition(String),
    #[error("Circular dependency detected: {}", .path.iter().join(" -> "))]
    CircularDependency { path: Vec<String> },
    #[error(
        "Component '{component}' requires a single '{type_name}', but found multiple candidates: {}",
        .candidates.iter().join(", ")
    )]
    AmbiguousDependency {
        component: String,
        type_name: String,
        candidates: Vec<String>,
    },
    #[error("Cannot satisfy parameter '{parameter}' of type '{type_name}' for component '{component}'")]
    UnsatisfiedDependency {
        component: String,
        parameter: String,
        type_name: String,
    },
    #[error("Error instantiating component '{name}': {source}")]
    Instantiation { name: String, source: ErrorPtr },
    #[error("Error initializing component '{name}': {source}")]
    Initialization { name: String, source: ErrorPtr },
    #[error("Component '{name}' is not compatible with requested type: {type_name}")]
    IncompatibleComponent { name: String, type_name: String },
    #[error("Error creating component '{component}' due to dependency '{dependency}': {source}")]
    DependencyFailed {
        component: String,
        dependency: String,
        source: Box<ComponentInstanceProviderError>,
    },
    #[error("Singleton creation of '{0}' is not allowed while singletons are being destroyed")]
    CreationNotAllowed(String),
    #[error("Singleton already registered under name: {0}")]
    DuplicateSingleton(String),
    #[error(transparent)]
    Registry(#[from] ComponentDefinitionRegistryError),
}

impl ComponentInstanceProviderError {
    /// Follows [DependencyFailed](Self::DependencyFailed) chains down to the error which caused the
    /// whole creation to fail.
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Self::DependencyFailed { source, .. } = current {
            current = source;
        }

        current
    }
}

/// Error related to component registries.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ComponentDefinitionRegistryError {
    #[error("Attempted to register a duplicated component with name: {0}")]
    DuplicateComponentName(String),
    #[error("No component definition registered with name: {0}")]
    NoSuchDefinition(String),
    #[error("Cannot modify definition '{0}' - an instance of it has already been created")]
    DefinitionInUse(String),
    #[error("Cannot register alias '{alias}' for name '{name}' - it is already registered for name '{registered_name}'")]
    DuplicateAlias {
        alias: String,
        name: String,
        registered_name: String,
    },
    #[error("Cannot register alias '{alias}' for name '{name}' - '{name}' is a direct or indirect alias for '{alias}' already")]
    CircularAlias { alias: String, name: String },
    #[error("No alias registered: {0}")]
    NoSuchAlias(String),
}

/// Definition inconsistencies discovered only when a recipe is executed.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum DefinitionError {
    #[error("No method named '{0}' is registered for the component")]
    NoSuchMethod(String),
    #[error("Component has property values defined, but no property binder")]
    NoPropertyBinder,
}

/// Failure of a single destruction callback. Destruction is best-effort, so these are collected
/// and reported after all components had a chance to be destroyed.
#[derive(Error, Clone, Debug)]
#[error("Error destroying component '{name}': {source}")]
pub struct DestructionError {
    pub name: String,
    pub source: ErrorPtr,
}
