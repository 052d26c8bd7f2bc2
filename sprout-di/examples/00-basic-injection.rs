use sprout_di::component::{Arguments, Constructible, Parameter};
use sprout_di::component_registry::ComponentDefinition;
use sprout_di::factory::ComponentFactoryBuilder;
use sprout_di::instance_provider::{ComponentInstancePtr, ErrorPtr, TypedComponentInstanceProvider};

// this is a dependency which will be injected into other components
struct TestDependency;

impl TestDependency {
    fn foo(&self) {
        println!("Hello world!");
    }
}

// this is another component, but with a dependency
struct TestComponent {
    dependency: ComponentInstancePtr<TestDependency>,
}

// Constructible tells the container which parameters are needed to create a component - they will
// be resolved by type, or by name if no component of a given type is registered
impl Constructible for TestComponent {
    fn parameters() -> Vec<Parameter> {
        vec![Parameter::of::<TestDependency>("dependency")]
    }

    fn construct(arguments: &Arguments) -> Result<Self, ErrorPtr> {
        Ok(Self {
            dependency: arguments.get::<TestDependency>(0)?,
        })
    }
}

impl TestComponent {
    fn call_foo(&self) {
        self.dependency.foo();
    }
}

//noinspection DuplicatedCode
// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // components are created by a ComponentFactory
    // for convenience, ComponentFactoryBuilder can be used to create the factory with a reasonable
    // default configuration
    let component_factory = ComponentFactoryBuilder::new().build();

    // definitions can be created from closures...
    component_factory
        .register_definition(
            "testDependency",
            ComponentDefinition::builder(|_| Ok(TestDependency)).build(),
        )
        .expect("error registering TestDependency");

    // ...or from types implementing Constructible
    component_factory
        .register_definition(
            "testComponent",
            ComponentDefinition::constructible::<TestComponent>().build(),
        )
        .expect("error registering TestComponent");

    let component = component_factory
        .primary_instance_typed::<TestComponent>()
        .expect("error creating TestComponent");

    // prints "Hello world!"
    component.call_foo();
}
