// note: this example assumes you've analyzed the previous one

use sprout::application::ApplicationContext;
use sprout::config::{ApplicationConfig, APPLICATION_CONFIG};
use sprout_di::component::Arguments;
use sprout_di::component_registry::{ComponentDefinition, ValueSource};
use sprout_di::instance_provider::ComponentInstancePtr;

// application config is read from environment variables prefixed with SPROUT_ and the optional
// sprout.json file, but can also be created explicitly
struct ConfigPrinter {
    config: ComponentInstancePtr<ApplicationConfig>,
}

fn main() {
    // start with a default config and override what's needed
    let config = ApplicationConfig::default()
        .with_install_tracing_logger(false)
        .with_allow_definition_overriding(false);

    let context = ApplicationContext::new(config);

    // the config itself is available as a singleton, so it can be injected like any other
    // component
    context
        .register_definition(
            "configPrinter",
            ComponentDefinition::builder(|arguments: &Arguments| {
                let printer = ConfigPrinter {
                    config: arguments.get::<ApplicationConfig>(0)?,
                };

                // prints "Definition overriding allowed: false"
                println!(
                    "Definition overriding allowed: {}",
                    printer.config.allow_definition_overriding
                );
                Ok(printer)
            })
            .parameter::<ApplicationConfig>("config")
            .indexed_argument(0, ValueSource::reference(APPLICATION_CONFIG))
            .build(),
        )
        .expect("error registering ConfigPrinter");

    // overriding is disabled, so this fails
    assert!(context
        .register_definition(
            "configPrinter",
            ComponentDefinition::builder(|_| Ok(())).build(),
        )
        .is_err());

    context.refresh().expect("error starting application");
}
