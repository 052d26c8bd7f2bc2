//! Component lifecycle: initialization callbacks wrapped by post-processors, and best-effort
//! destruction in reverse dependency order.
//!
//! Singletons go through the following states, which can be queried at any time:
//!
//! ```text
//! Raw -> PropertiesSet -> PreInit -> Initialized -> Destroyed
//! ```
//!
//! Prototypes go through the same steps, but their states are not tracked, since the container does
//! not manage their lifetime.

use crate::component::{AFTER_PROPERTIES_SET, DESTROY};
use crate::component_registry::{ComponentDefinition, ComponentDefinitionRegistry};
use crate::dependency_graph::DependencyGraph;
use crate::error::{ComponentInstanceProviderError, DefinitionError, DestructionError};
use crate::instance_provider::{ComponentInstanceAnyPtr, ErrorPtr};
use crate::post_processor::ComponentPostProcessorPtr;
use crate::scope::SingletonScope;
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum LifecycleState {
    /// Constructed, but without properties.
    Raw,
    PropertiesSet,
    /// Before-initialization post-processors have run.
    PreInit,
    /// Fully initialized and ready for use.
    Initialized,
    Destroyed,
}

enum Phase {
    BeforeInitialization,
    AfterInitialization,
}

/// Drives instances through initialization and destruction.
#[derive(Default)]
pub struct LifecycleEngine {
    post_processors: RwLock<Vec<ComponentPostProcessorPtr>>,
    states: Mutex<FxHashMap<String, LifecycleState>>,
}

impl LifecycleEngine {
    /// Adds a post-processor, keeping all of them sorted by their order. Post-processors with equal
    /// order run in the order they were added.
    pub fn add_post_processor(&self, post_processor: ComponentPostProcessorPtr) {
        let mut post_processors = self.post_processors.write();
        post_processors.push(post_processor);
        post_processors.sort_by_key(|post_processor| post_processor.order());
    }

    pub fn post_processors(&self) -> Vec<ComponentPostProcessorPtr> {
        self.post_processors.read().clone()
    }

    /// Returns the current state of a singleton, if it has been created at some point.
    pub fn state(&self, name: &str) -> Option<LifecycleState> {
        self.states.lock().get(name).copied()
    }

    pub(crate) fn record_state(
        &self,
        name: &str,
        definition: Option<&ComponentDefinition>,
        state: LifecycleState,
    ) {
        if definition.map(ComponentDefinition::is_singleton).unwrap_or(true) {
            trace!("Component '{name}' is now in state: {state:?}");
            self.states.lock().insert(name.to_string(), state);
        }
    }

    pub(crate) fn clear_state(&self, name: &str) {
        self.states.lock().remove(name);
    }

    /// Runs before-initialization post-processors, initialization callbacks and after-initialization
    /// post-processors. Returns the final, possibly replaced, instance.
    pub fn initialize(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        instance: ComponentInstanceAnyPtr,
    ) -> Result<ComponentInstanceAnyPtr, ComponentInstanceProviderError> {
        let to_initialization_error = |source: ErrorPtr| ComponentInstanceProviderError::Initialization {
            name: name.to_string(),
            source,
        };

        let post_processors = self.post_processors();

        let instance = apply_post_processors(
            &post_processors,
            Phase::BeforeInitialization,
            instance,
            name,
        )
        .map_err(to_initialization_error)?;

        self.record_state(name, Some(definition), LifecycleState::PreInit);

        invoke_init_callbacks(definition, &instance).map_err(to_initialization_error)?;

        let instance = apply_post_processors(
            &post_processors,
            Phase::AfterInitialization,
            instance,
            name,
        )
        .map_err(to_initialization_error)?;

        self.record_state(name, Some(definition), LifecycleState::Initialized);

        debug!("Initialized component: {name}");
        Ok(instance)
    }

    /// Runs destruction callbacks for a single instance. Failures are logged and returned, not
    /// propagated. Instances without a definition (registered manually) have no callbacks.
    pub fn destroy(
        &self,
        name: &str,
        definition: Option<&ComponentDefinition>,
        instance: &ComponentInstanceAnyPtr,
    ) -> Vec<DestructionError> {
        let mut errors = vec![];

        if let Some(definition) = definition {
            if let Some(disposer) = &definition.disposer {
                if let Err(error) = disposer(instance) {
                    errors.push(destruction_error(name, error));
                }
            }

            if let Some(method_name) = &definition.destroy_method_name {
                if !(method_name == DESTROY && definition.disposer.is_some()) {
                    if let Err(error) = invoke_method(definition, method_name, instance) {
                        errors.push(destruction_error(name, error));
                    }
                }
            }
        }

        self.record_state(name, definition, LifecycleState::Destroyed);

        debug!("Destroyed component: {name}");
        errors
    }

    /// Destroys all stored singletons, dependents before their dependencies. Singletons which are
    /// not related by dependencies are destroyed in reverse creation order. Singleton creation is
    /// rejected for the whole duration and the dependency graph is cleared afterwards.
    pub fn destroy_all(
        &self,
        singletons: &SingletonScope,
        dependency_graph: &DependencyGraph,
        definition_registry: &dyn ComponentDefinitionRegistry,
    ) -> Vec<DestructionError> {
        debug!("Destroying singletons...");

        singletons.set_in_destruction(true);

        let names = singletons.names();
        let order = dependency_graph.destruction_order(names.iter().rev().map(String::as_str));

        let errors = self.destroy_in_order(&order, singletons, definition_registry);

        dependency_graph.clear();
        singletons.set_in_destruction(false);

        errors
    }

    /// Destroys given singleton, after destroying all singletons which depend on it.
    pub fn destroy_with_dependents(
        &self,
        name: &str,
        singletons: &SingletonScope,
        dependency_graph: &DependencyGraph,
        definition_registry: &dyn ComponentDefinitionRegistry,
    ) -> Vec<DestructionError> {
        let order = dependency_graph.destruction_order([name]);
        let errors = self.destroy_in_order(&order, singletons, definition_registry);

        for name in &order {
            dependency_graph.remove_component(name);
        }

        errors
    }

    fn destroy_in_order(
        &self,
        order: &[String],
        singletons: &SingletonScope,
        definition_registry: &dyn ComponentDefinitionRegistry,
    ) -> Vec<DestructionError> {
        order
            .iter()
            .filter_map(|name| singletons.remove(name).map(|instance| (name, instance)))
            .flat_map(|(name, instance)| {
                let definition = definition_registry.definition(name).ok();
                self.destroy(name, definition.as_deref(), &instance)
            })
            .collect()
    }
}

fn destruction_error(name: &str, source: ErrorPtr) -> DestructionError {
    warn!("Error destroying component '{name}': {source}");
    DestructionError {
        name: name.to_string(),
        source,
    }
}

fn apply_post_processors(
    post_processors: &[ComponentPostProcessorPtr],
    phase: Phase,
    mut instance: ComponentInstanceAnyPtr,
    name: &str,
) -> Result<ComponentInstanceAnyPtr, ErrorPtr> {
    for post_processor in post_processors {
        let result = match phase {
            Phase::BeforeInitialization => {
                post_processor.before_initialization(instance.clone(), name)?
            }
            Phase::AfterInitialization => {
                post_processor.after_initialization(instance.clone(), name)?
            }
        };

        match result {
            Some(processed) => instance = processed,
            None => {
                trace!("Post-processing of '{name}' stopped by a post-processor.");
                break;
            }
        }
    }

    Ok(instance)
}

fn invoke_init_callbacks(
    definition: &ComponentDefinition,
    instance: &ComponentInstanceAnyPtr,
) -> Result<(), ErrorPtr> {
    if let Some(initializer) = &definition.initializer {
        initializer(instance)?;
    }

    match &definition.init_method_name {
        Some(method_name)
            if !(method_name == AFTER_PROPERTIES_SET && definition.initializer.is_some()) =>
        {
            invoke_method(definition, method_name, instance)
        }
        _ => Ok(()),
    }
}

fn invoke_method(
    definition: &ComponentDefinition,
    method_name: &str,
    instance: &ComponentInstanceAnyPtr,
) -> Result<(), ErrorPtr> {
    let method = definition.methods.get(method_name).ok_or_else(|| {
        Arc::new(DefinitionError::NoSuchMethod(method_name.to_string())) as ErrorPtr
    })?;

    method(instance)
}

#[cfg(test)]
//noinspection DuplicatedCode
mod tests {
    use crate::component::{DisposableComponent, InitializingComponent, AFTER_PROPERTIES_SET};
    use crate::component_registry::{
        ComponentDefinition, ComponentDefinitionRegistry, DefaultComponentDefinitionRegistry,
    };
    use crate::dependency_graph::DependencyGraph;
    use crate::error::{ComponentInstanceProviderError, DefinitionError};
    use crate::instance_provider::{ComponentInstanceAnyPtr, ComponentInstancePtr, ErrorPtr};
    use crate::lifecycle::{LifecycleEngine, LifecycleState};
    use crate::post_processor::{ComponentPostProcessorPtr, MockComponentPostProcessor};
    use crate::scope::SingletonScope;
    use mockall::Sequence;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("test error")]
    struct TestError;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn record(&self, call: &str) -> Result<(), ErrorPtr> {
            self.calls.lock().push(call.to_string());
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl InitializingComponent for Recorder {
        fn after_properties_set(&self) -> Result<(), ErrorPtr> {
            self.record(AFTER_PROPERTIES_SET)
        }
    }

    impl DisposableComponent for Recorder {
        fn destroy(&self) -> Result<(), ErrorPtr> {
            self.record("dispose")
        }
    }

    fn recorder_instance() -> (ComponentInstancePtr<Recorder>, ComponentInstanceAnyPtr) {
        let recorder = ComponentInstancePtr::new(Recorder::default());
        let instance = recorder.clone() as ComponentInstanceAnyPtr;
        (recorder, instance)
    }

    fn post_processor(
        order: i32,
        before: Option<ComponentInstanceAnyPtr>,
        calls: Arc<Mutex<Vec<i32>>>,
    ) -> ComponentPostProcessorPtr {
        let mut post_processor = MockComponentPostProcessor::new();
        post_processor.expect_order().return_const(order);
        post_processor
            .expect_before_initialization()
            .returning(move |instance, _| {
                calls.lock().push(order);
                Ok(Some(before.clone().unwrap_or(instance)))
            });
        post_processor
            .expect_after_initialization()
            .returning(|instance, _| Ok(Some(instance)));

        Arc::new(post_processor)
    }

    #[test]
    fn should_run_post_processors_in_order() {
        let engine = LifecycleEngine::default();
        let calls = Arc::new(Mutex::new(vec![]));

        engine.add_post_processor(post_processor(10, None, calls.clone()));
        engine.add_post_processor(post_processor(-5, None, calls.clone()));
        engine.add_post_processor(post_processor(0, None, calls.clone()));
        engine.add_post_processor(post_processor(0, None, calls.clone()));

        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default())).build();
        let (_, instance) = recorder_instance();

        engine.initialize("a", &definition, instance).unwrap();

        assert_eq!(*calls.lock(), vec![-5, 0, 0, 10]);
    }

    #[test]
    fn should_pass_replaced_instance_down_the_chain() {
        let engine = LifecycleEngine::default();
        let replacement = ComponentInstancePtr::new(7_i32) as ComponentInstanceAnyPtr;

        engine.add_post_processor(post_processor(
            0,
            Some(replacement.clone()),
            Default::default(),
        ));

        let mut observer = MockComponentPostProcessor::new();
        observer.expect_order().return_const(1);
        observer
            .expect_before_initialization()
            .withf(|instance, _| instance.downcast_ref::<i32>() == Some(&7))
            .times(1)
            .returning(|instance, _| Ok(Some(instance)));
        observer
            .expect_after_initialization()
            .returning(|instance, _| Ok(Some(instance)));
        engine.add_post_processor(Arc::new(observer));

        let definition = ComponentDefinition::builder(|_| Ok(0_i32)).build();
        let instance = engine
            .initialize("a", &definition, ComponentInstancePtr::new(1_i32))
            .unwrap();

        assert!(Arc::ptr_eq(&instance, &replacement));
    }

    #[test]
    fn should_short_circuit_post_processors() {
        let engine = LifecycleEngine::default();

        let mut stopper = MockComponentPostProcessor::new();
        stopper.expect_order().return_const(0);
        stopper
            .expect_before_initialization()
            .times(1)
            .returning(|_, _| Ok(None));
        stopper
            .expect_after_initialization()
            .returning(|instance, _| Ok(Some(instance)));
        engine.add_post_processor(Arc::new(stopper));

        let mut skipped = MockComponentPostProcessor::new();
        skipped.expect_order().return_const(1);
        skipped.expect_before_initialization().never();
        skipped
            .expect_after_initialization()
            .times(1)
            .returning(|instance, _| Ok(Some(instance)));
        engine.add_post_processor(Arc::new(skipped));

        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default()))
            .initializing()
            .build();
        let (recorder, instance) = recorder_instance();

        let result = engine.initialize("a", &definition, instance.clone()).unwrap();

        assert!(Arc::ptr_eq(&result, &instance));
        assert_eq!(recorder.calls(), vec![AFTER_PROPERTIES_SET]);
    }

    #[test]
    fn should_invoke_init_callbacks_in_order() {
        let engine = LifecycleEngine::default();
        let mut sequence = Sequence::new();

        let mut post_processor = MockComponentPostProcessor::new();
        post_processor.expect_order().return_const(0);
        post_processor
            .expect_before_initialization()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|instance, _| {
                let recorder = instance.downcast_ref::<Recorder>().unwrap();
                assert!(recorder.calls().is_empty());
                Ok(Some(instance))
            });
        post_processor
            .expect_after_initialization()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|instance, _| {
                let recorder = instance.downcast_ref::<Recorder>().unwrap();
                assert_eq!(recorder.calls().len(), 2);
                Ok(Some(instance))
            });
        engine.add_post_processor(Arc::new(post_processor));

        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default()))
            .initializing()
            .init_method("init", |recorder: &Recorder| recorder.record("init"))
            .build();
        let (recorder, instance) = recorder_instance();

        engine.initialize("a", &definition, instance).unwrap();

        assert_eq!(recorder.calls(), vec![AFTER_PROPERTIES_SET, "init"]);
        assert_eq!(engine.state("a"), Some(LifecycleState::Initialized));
    }

    #[test]
    fn should_not_invoke_same_init_method_twice() {
        let engine = LifecycleEngine::default();
        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default()))
            .initializing()
            .init_method_name(AFTER_PROPERTIES_SET)
            .build();
        let (recorder, instance) = recorder_instance();

        engine.initialize("a", &definition, instance).unwrap();

        assert_eq!(recorder.calls(), vec![AFTER_PROPERTIES_SET]);
    }

    #[test]
    fn should_wrap_init_errors() {
        let engine = LifecycleEngine::default();
        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default()))
            .init_method("init", |_: &Recorder| Err(Arc::new(TestError) as ErrorPtr))
            .build();
        let (_, instance) = recorder_instance();

        assert!(matches!(
            engine.initialize("a", &definition, instance).unwrap_err(),
            ComponentInstanceProviderError::Initialization { name, .. } if name == "a"
        ));
        assert_eq!(engine.state("a"), Some(LifecycleState::PreInit));
    }

    #[test]
    fn should_fail_on_missing_init_method() {
        let engine = LifecycleEngine::default();
        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default()))
            .init_method_name("missing")
            .build();
        let (_, instance) = recorder_instance();

        match engine.initialize("a", &definition, instance).unwrap_err() {
            ComponentInstanceProviderError::Initialization { source, .. } => assert_eq!(
                source.downcast_ref::<DefinitionError>(),
                Some(&DefinitionError::NoSuchMethod("missing".to_string()))
            ),
            error => panic!("unexpected error: {error}"),
        }
    }

    #[test]
    fn should_not_track_prototype_states() {
        let engine = LifecycleEngine::default();
        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default()))
            .prototype()
            .build();
        let (_, instance) = recorder_instance();

        engine.initialize("a", &definition, instance).unwrap();

        assert_eq!(engine.state("a"), None);
    }

    #[test]
    fn should_collect_destruction_errors() {
        let engine = LifecycleEngine::default();
        let definition = ComponentDefinition::builder(|_| Ok(Recorder::default()))
            .disposable()
            .destroy_method("close", |_: &Recorder| Err(Arc::new(TestError) as ErrorPtr))
            .build();
        let (recorder, instance) = recorder_instance();

        let errors = engine.destroy("a", Some(&definition), &instance);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "a");
        assert_eq!(recorder.calls(), vec!["dispose"]);
        assert_eq!(engine.state("a"), Some(LifecycleState::Destroyed));
    }

    #[test]
    fn should_destroy_all_in_reverse_dependency_order() {
        let engine = LifecycleEngine::default();
        let singletons = SingletonScope::default();
        let dependency_graph = DependencyGraph::default();
        let registry = DefaultComponentDefinitionRegistry::default();
        let destroyed = Arc::new(Mutex::new(vec![]));

        for name in ["a", "b", "c"] {
            let destroyed = destroyed.clone();
            registry
                .register(
                    name,
                    ComponentDefinition::builder(|_| Ok(Recorder::default()))
                        .destroy_method("close", move |_: &Recorder| {
                            destroyed.lock().push(name);
                            Ok(())
                        })
                        .build(),
                )
                .unwrap();
        }

        // a -> b -> c, but stored in an unrelated order
        dependency_graph.register_dependency("b", "a");
        dependency_graph.register_dependency("c", "b");
        for name in ["b", "a", "c"] {
            singletons
                .register(name, recorder_instance().1)
                .unwrap();
        }

        let errors = engine.destroy_all(&singletons, &dependency_graph, &registry);

        assert!(errors.is_empty());
        assert_eq!(*destroyed.lock(), vec!["a", "b", "c"]);
        assert!(singletons.names().is_empty());
        assert!(!singletons.is_in_destruction());
        assert!(dependency_graph.dependent_components("c").is_empty());
    }

    #[test]
    fn should_continue_destruction_after_failure() {
        let engine = LifecycleEngine::default();
        let singletons = SingletonScope::default();
        let dependency_graph = DependencyGraph::default();
        let registry = DefaultComponentDefinitionRegistry::default();

        registry
            .register(
                "failing",
                ComponentDefinition::builder(|_| Ok(Recorder::default()))
                    .destroy_method("close", |_: &Recorder| Err(Arc::new(TestError) as ErrorPtr))
                    .build(),
            )
            .unwrap();
        registry
            .register(
                "working",
                ComponentDefinition::builder(|_| Ok(Recorder::default()))
                    .disposable()
                    .build(),
            )
            .unwrap();

        let (working, working_instance) = recorder_instance();
        singletons.register("working", working_instance).unwrap();
        singletons
            .register("failing", recorder_instance().1)
            .unwrap();

        let errors = engine.destroy_all(&singletons, &dependency_graph, &registry);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "failing");
        assert_eq!(working.calls(), vec!["dispose"]);
    }

    #[test]
    fn should_destroy_dependents_first() {
        let engine = LifecycleEngine::default();
        let singletons = SingletonScope::default();
        let dependency_graph = DependencyGraph::default();
        let registry = DefaultComponentDefinitionRegistry::default();

        dependency_graph.register_dependency("b", "a");
        for name in ["a", "b", "c"] {
            singletons
                .register(name, recorder_instance().1)
                .unwrap();
        }

        let errors = engine.destroy_with_dependents("b", &singletons, &dependency_graph, &registry);

        assert!(errors.is_empty());
        assert_eq!(singletons.names(), vec!["c".to_string()]);
        assert!(dependency_graph.dependent_components("b").is_empty());
        assert_eq!(engine.state("a"), Some(LifecycleState::Destroyed));
    }
}
