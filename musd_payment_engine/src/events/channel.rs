//! Simple bounded event channel for ledger notifications.
//!
//! Ledger implementations push notifications through an [`EventProducer`]; the subscriber side is
//! a plain `tokio` mpsc receiver, so consumers decide their own dispatch policy. Producers are
//! cheap to clone. When every producer has been dropped the receiver drains and closes, which is
//! how downstream consumers learn the subscription has ended.

use log::*;
use tokio::sync::mpsc;

/// Default buffer for ledger event channels. Events are small; the buffer only needs to absorb
/// short bursts while a consumer is busy.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

/// Create a bounded event channel, returning the producer and the raw receiver.
pub fn event_channel<E: Send + Sync>(buffer: usize) -> (EventProducer<E>, mpsc::Receiver<E>) {
    let (sender, receiver) = mpsc::channel(buffer);
    (EventProducer::new(sender), receiver)
}
