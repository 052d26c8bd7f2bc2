// note: this example assumes you've analyzed the previous one

use sprout_di::component_registry::ComponentDefinition;
use sprout_di::factory::ComponentFactoryBuilder;
use sprout_di::instance_provider::{ComponentInstancePtr, TypedComponentInstanceProvider};
use std::sync::Mutex;

struct TestDependency {
    // this is some example state which is not shared between other instances of this component
    some_state: Mutex<i32>,
}

impl TestDependency {
    fn new() -> Self {
        // to show we're constructed on each request, let's print some info
        println!("TestDependency created!");
        Self {
            some_state: Mutex::default(),
        }
    }

    fn foo(&self) {
        let mut some_state = self.some_state.lock().unwrap();
        *some_state += 1;

        println!("{}", some_state);
    }
}

struct TestComponent {
    dependency_1: ComponentInstancePtr<TestDependency>,
    dependency_2: ComponentInstancePtr<TestDependency>,
}

impl TestComponent {
    fn call_foo(&self) {
        self.dependency_1.foo();
        self.dependency_2.foo();
    }
}

//noinspection DuplicatedCode
fn main() {
    let component_factory = ComponentFactoryBuilder::new().build();

    // scopes decide when to create and when to reuse instances
    // prototypes are created on every request, which is useful for stateful components
    // note: the container does not destroy prototypes - this is the responsibility of the caller
    component_factory
        .register_definition(
            "testDependency",
            ComponentDefinition::builder(|_| Ok(TestDependency::new()))
                .prototype()
                .build(),
        )
        .expect("error registering TestDependency");

    // singletons are the default - there's only a single instance of TestComponent, which means
    // there is only a single instance of each of its dependencies, even if they're prototypes
    component_factory
        .register_definition(
            "testComponent",
            ComponentDefinition::builder(|arguments| {
                Ok(TestComponent {
                    dependency_1: arguments.get::<TestDependency>(0)?,
                    dependency_2: arguments.get::<TestDependency>(1)?,
                })
            })
            .parameter::<TestDependency>("dependency_1")
            .parameter::<TestDependency>("dependency_2")
            .build(),
        )
        .expect("error registering TestComponent");

    // should print "TestDependency created!" twice
    let component = component_factory
        .primary_instance_typed::<TestComponent>()
        .expect("error creating TestComponent");

    // should print "1" twice, since both dependencies are separate instances
    component.call_foo();

    // no new instances should be created, since TestComponent is a singleton
    let component = component_factory
        .primary_instance_typed::<TestComponent>()
        .expect("error creating TestComponent");

    // should print "2" twice
    component.call_foo();
}
