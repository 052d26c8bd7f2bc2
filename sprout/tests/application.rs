use parking_lot::Mutex;
use sprout::application::{ApplicationContext, ApplicationError};
use sprout::config::ApplicationConfig;
use sprout::post_processor::{ComponentDefinitionRegistry, DefinitionPostProcessor, ErrorPtr};
use sprout_di::component_registry::ComponentDefinition;
use sprout_di::instance_provider::{ComponentInstanceProviderError, TypedComponentInstanceProvider};
use std::sync::Arc;

type Events = Arc<Mutex<Vec<String>>>;

struct Service;

fn config() -> ApplicationConfig {
    ApplicationConfig::default().with_install_tracing_logger(false)
}

fn tracked(name: &'static str, events: &Events) -> ComponentDefinition {
    let created = events.clone();
    let destroyed = events.clone();

    ComponentDefinition::builder(move |_| {
        created.lock().push(format!("create {name}"));
        Ok(Service)
    })
    .destroy_method("destroy", move |_: &Service| {
        destroyed.lock().push(format!("destroy {name}"));
        Ok(())
    })
    .build()
}

struct LazyMarker;

impl DefinitionPostProcessor for LazyMarker {
    fn post_process(&self, registry: &dyn ComponentDefinitionRegistry) -> Result<(), ErrorPtr> {
        registry
            .replace(
                "lazy",
                ComponentDefinition::builder(|_| Ok(Service)).lazy_init().build(),
            )
            .map_err(|error| Arc::new(error) as ErrorPtr)
    }
}

#[test]
fn should_start_and_stop_in_dependency_order() {
    let events = Events::default();
    let context = ApplicationContext::new(config());

    context
        .register_definition("repository", tracked("repository", &events))
        .unwrap();

    let created = events.clone();
    let destroyed = events.clone();
    context
        .register_definition(
            "controller",
            ComponentDefinition::builder(move |_| {
                created.lock().push("create controller".to_string());
                Ok(Service)
            })
            .depends_on("repository")
            .destroy_method("destroy", move |_: &Service| {
                destroyed.lock().push("destroy controller".to_string());
                Ok(())
            })
            .build(),
        )
        .unwrap();

    context.refresh().unwrap();
    assert!(context.close().is_empty());

    assert_eq!(
        *events.lock(),
        vec![
            "create repository",
            "create controller",
            "destroy controller",
            "destroy repository"
        ]
    );
}

#[test]
fn should_close_on_drop() {
    let events = Events::default();

    {
        let context = ApplicationContext::new(config());
        context
            .register_definition("service", tracked("service", &events))
            .unwrap();
        context.refresh().unwrap();
    }

    assert_eq!(*events.lock(), vec!["create service", "destroy service"]);
}

#[test]
fn should_let_definition_post_processors_change_definitions() {
    let events = Events::default();
    let context = ApplicationContext::new(config());

    context
        .register_definition("lazy", tracked("lazy", &events))
        .unwrap();
    context.add_definition_post_processor(Arc::new(LazyMarker));

    context.refresh().unwrap();

    assert!(events.lock().is_empty());
    assert!(!context.factory().contains_singleton("lazy"));
    assert!(context.instance_by_name_typed::<Service>("lazy").is_ok());
}

#[test]
fn should_report_singleton_creation_failure() {
    let events = Events::default();
    let context = ApplicationContext::new(config());

    context
        .register_definition("healthy", tracked("healthy", &events))
        .unwrap();
    context
        .register_definition(
            "broken",
            ComponentDefinition::builder(|_| Ok(Service))
                .depends_on("missing")
                .build(),
        )
        .unwrap();

    let error = context.refresh().unwrap_err();
    assert!(matches!(
        error,
        ApplicationError::SingletonCreationError(ComponentInstanceProviderError::DependencyFailed {
            ..
        })
    ));
    assert!(!context.is_active());

    assert!(!context.factory().contains_singleton("healthy"));
    assert_eq!(*events.lock(), vec!["create healthy", "destroy healthy"]);

    drop(context);
    assert_eq!(events.lock().len(), 2);
}

#[test]
fn should_keep_contexts_independent() {
    let first = ApplicationContext::new(config());
    let second = ApplicationContext::new(config());

    first
        .register_definition(
            "service",
            ComponentDefinition::builder(|_| Ok(Service)).build(),
        )
        .unwrap();

    first.refresh().unwrap();
    second.refresh().unwrap();

    assert!(first.instance_by_name_typed::<Service>("service").is_ok());
    assert!(second.instance_by_name_typed::<Service>("service").is_err());
}
