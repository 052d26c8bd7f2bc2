use sprout_di::component::{DisposableComponent, InitializingComponent};
use sprout_di::component_registry::ComponentDefinition;
use sprout_di::factory::ComponentFactoryBuilder;
use sprout_di::instance_provider::{ComponentInstanceAnyPtr, ErrorPtr, TypedComponentInstanceProvider};
use sprout_di::post_processor::ComponentPostProcessor;
use std::sync::Arc;

struct Database;

// built-in callbacks are enabled by implementing capability traits and calling the corresponding
// builder methods
impl InitializingComponent for Database {
    fn after_properties_set(&self) -> Result<(), ErrorPtr> {
        println!("Database: after_properties_set");
        Ok(())
    }
}

impl DisposableComponent for Database {
    fn destroy(&self) -> Result<(), ErrorPtr> {
        println!("Database: destroy");
        Ok(())
    }
}

struct Repository;

// post-processors see every component before and after initialization callbacks, and can replace
// the instances they get
struct LoggingPostProcessor;

impl ComponentPostProcessor for LoggingPostProcessor {
    fn before_initialization(
        &self,
        instance: ComponentInstanceAnyPtr,
        name: &str,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        println!("Before initializing: {name}");
        Ok(Some(instance))
    }

    fn after_initialization(
        &self,
        instance: ComponentInstanceAnyPtr,
        name: &str,
    ) -> Result<Option<ComponentInstanceAnyPtr>, ErrorPtr> {
        println!("After initializing: {name}");
        Ok(Some(instance))
    }
}

//noinspection DuplicatedCode
fn main() {
    let component_factory = ComponentFactoryBuilder::new()
        .with_post_processor(Arc::new(LoggingPostProcessor))
        .build();

    component_factory
        .register_definition(
            "database",
            ComponentDefinition::builder(|_| Ok(Database))
                .initializing()
                .disposable()
                .build(),
        )
        .expect("error registering Database");

    // custom init and destroy methods can be registered by name; depends_on makes sure the
    // database is fully initialized before the repository, even without injecting it
    component_factory
        .register_definition(
            "repository",
            ComponentDefinition::builder(|_| Ok(Repository))
                .depends_on("database")
                .init_method("connect", |_: &Repository| {
                    println!("Repository: connect");
                    Ok(())
                })
                .destroy_method("disconnect", |_: &Repository| {
                    println!("Repository: disconnect");
                    Ok(())
                })
                .build(),
        )
        .expect("error registering Repository");

    component_factory
        .instance_by_name_typed::<Repository>("repository")
        .expect("error creating Repository");

    // repository gets destroyed before the database, since it depends on it
    for error in component_factory.destroy_singletons() {
        eprintln!("{error}");
    }
}
