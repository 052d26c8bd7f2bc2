use sprout::application::ApplicationContext;
use sprout_di::instance_provider::TypedComponentInstanceProvider;
use sprout_messaging::broker::BrokerMessageHandler;
use sprout_messaging::config::MessagingConfig;
use sprout_messaging::message::{Message, SimpMessageType};
use sprout_messaging::registration::{MessagingComponentsRegistrar, BROKER_MESSAGE_HANDLER};
use std::sync::Arc;

//noinspection DuplicatedCode
fn main() {
    let context =
        ApplicationContext::from_environment().expect("unable to read application config");

    // messaging config is read from the "messaging" key of sprout.json
    let config = MessagingConfig::init_from_config().expect("unable to read messaging config");
    context.add_definition_post_processor(Arc::new(MessagingComponentsRegistrar::new(config)));

    context.refresh().expect("error starting application");

    let broker = context
        .instance_by_name_typed::<BrokerMessageHandler>(BROKER_MESSAGE_HANDLER)
        .expect("error getting broker");

    // a transport would normally produce these messages from client frames
    let messages = [
        Message::builder(SimpMessageType::Connect)
            .session_id("s1")
            .user("alice")
            .build(),
        Message::builder(SimpMessageType::Subscribe)
            .session_id("s1")
            .subscription_id("news")
            .destination("/topic/news")
            .build(),
        Message::builder(SimpMessageType::Subscribe)
            .session_id("s1")
            .subscription_id("replies")
            .destination("/user/queue/replies")
            .build(),
        Message::builder(SimpMessageType::Message)
            .destination("/topic/news")
            .payload("extra, extra")
            .build(),
        Message::builder(SimpMessageType::Message)
            .destination("/user/alice/queue/replies")
            .payload("hi alice")
            .build(),
    ];

    for message in messages {
        for delivery in broker
            .handle_message(&message)
            .expect("error handling message")
        {
            println!(
                "{} -> session {} (subscription {}): {}",
                delivery.destination,
                delivery.session_id,
                delivery.subscription_id,
                String::from_utf8_lossy(&message.payload)
            );
        }
    }
}
