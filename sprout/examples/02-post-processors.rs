// note: this example assumes you've analyzed the previous ones

use sprout::application::ApplicationContext;
use sprout::config::ApplicationConfig;
use sprout::post_processor::{ComponentDefinitionRegistry, DefinitionPostProcessor, ErrorPtr};
use sprout_di::component_registry::ComponentDefinition;
use std::sync::Arc;

struct Worker(&'static str);

// definition post-processors run before any singleton is created, so they can safely change what
// gets created
struct WorkerRegistrar {
    order: i32,
    worker: &'static str,
}

impl DefinitionPostProcessor for WorkerRegistrar {
    fn post_process(&self, registry: &dyn ComponentDefinitionRegistry) -> Result<(), ErrorPtr> {
        let worker = self.worker;
        println!("Registering {worker} with order {}", self.order);

        registry
            .register(
                "worker",
                ComponentDefinition::builder(move |_| {
                    println!("Creating {worker}");
                    Ok(Worker(worker))
                })
                .build(),
            )
            .map_err(|error| Arc::new(error) as ErrorPtr)
    }

    fn order(&self) -> i32 {
        self.order
    }
}

fn main() {
    let context = ApplicationContext::new(ApplicationConfig::default());

    // lower order runs first, so the second registration overrides the first one and only the
    // "late" worker gets created
    context.add_definition_post_processor(Arc::new(WorkerRegistrar {
        order: 10,
        worker: "late",
    }));
    context.add_definition_post_processor(Arc::new(WorkerRegistrar {
        order: -10,
        worker: "early",
    }));

    context.refresh().expect("error starting application");
}
