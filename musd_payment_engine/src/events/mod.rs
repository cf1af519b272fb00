mod channel;
mod event_types;

pub use channel::{event_channel, EventProducer, DEFAULT_EVENT_BUFFER};
pub use event_types::PaymentCreatedEvent;
