use sprout::application::ApplicationContext;
use sprout_di::component::Arguments;
use sprout_di::component_registry::{ComponentDefinition, ValueSource};
use sprout_di::instance_provider::{ComponentInstancePtr, TypedComponentInstanceProvider};

struct Greeting(String);

struct Greeter {
    greeting: ComponentInstancePtr<Greeting>,
}

impl Greeter {
    fn greet(&self, name: &str) {
        println!("{}, {name}!", self.greeting.0);
    }
}

//noinspection DuplicatedCode
fn main() {
    // the context owns all the components - there is no global state, so multiple contexts can
    // live side by side
    let context =
        ApplicationContext::from_environment().expect("unable to read application config");

    context
        .register_definition(
            "greeting",
            ComponentDefinition::builder(|arguments: &Arguments| {
                Ok(Greeting(arguments.cloned::<String>(0)?))
            })
            .parameter::<String>("text")
            .indexed_argument(0, ValueSource::literal("Hello".to_string()))
            .build(),
        )
        .expect("error registering Greeting");

    // Greeting gets injected by type, since it's the only one registered
    context
        .register_definition(
            "greeter",
            ComponentDefinition::builder(|arguments: &Arguments| {
                Ok(Greeter {
                    greeting: arguments.get::<Greeting>(0)?,
                })
            })
            .parameter::<Greeting>("greeting")
            .build(),
        )
        .expect("error registering Greeter");

    // refreshing creates all non-lazy singletons
    context.refresh().expect("error starting application");

    context
        .instance_by_name_typed::<Greeter>("greeter")
        .expect("error getting Greeter")
        .greet("world");

    // dropping an active context would close it as well
    for error in context.close() {
        eprintln!("{error}");
    }
}
