//! In-process request/reply bus.
//!
//! Consumers register on a string address. `send` hands a message to exactly
//! one consumer of that address (round-robin when several are registered) and
//! waits for its reply, its coded failure, or the delivery timeout.

pub mod message;

pub use message::{DeliveryOptions, Envelope, Message, ReplyFailure, Responder};

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

// per consumer; senders wait when a consumer falls this far behind
pub(crate) const CONSUMER_QUEUE_CAPACITY: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("No handlers registered for address {address}")]
    NoHandlers { address: String },
    #[error("Timed out after {after:?} waiting for a reply from {address}")]
    Timeout { address: String, after: Duration },
    #[error("Consumer dropped the message without replying")]
    NoReply,
    #[error("Recipient failure ({code}): {message}")]
    Recipient { code: i32, message: String },
    #[error("Unexpected reply payload: {0}")]
    Decode(String),
}

struct Slot {
    id: u64,
    sender: mpsc::Sender<Envelope>,
}

#[derive(Default)]
struct AddressGroup {
    slots: Vec<Slot>,
    cursor: usize,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    groups: HashMap<String, AddressGroup>,
}

impl Registry {
    fn remove(&mut self, address: &str, id: u64) {
        if let Some(group) = self.groups.get_mut(address) {
            group.slots.retain(|slot| slot.id != id);
            if group.slots.is_empty() {
                self.groups.remove(address);
            }
        }
    }

    // next live consumer for the address, dropping any whose receiver is gone
    fn pick(&mut self, address: &str) -> Option<mpsc::Sender<Envelope>> {
        let group = self.groups.get_mut(address)?;
        group.slots.retain(|slot| !slot.sender.is_closed());

        if group.slots.is_empty() {
            self.groups.remove(address);
            return None;
        }

        let index = group.cursor % group.slots.len();
        group.cursor = index + 1;
        Some(group.slots[index].sender.clone())
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.registry)
    }

    /// Registers a new consumer on `address`.
    pub fn consumer(&self, address: &str) -> MessageConsumer {
        let (sender, receiver) = mpsc::channel(CONSUMER_QUEUE_CAPACITY);

        let mut registry = self.registry();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .groups
            .entry(address.to_string())
            .or_default()
            .slots
            .push(Slot { id, sender });

        debug!(address, consumer = id, "Registered consumer");

        MessageConsumer {
            address: address.to_string(),
            id,
            receiver,
            registry: self.registry.clone(),
        }
    }

    pub fn consumer_count(&self, address: &str) -> usize {
        self.registry()
            .groups
            .get(address)
            .map(|group| group.slots.len())
            .unwrap_or(0)
    }

    pub async fn send(
        &self,
        address: &str,
        message: Message,
        options: DeliveryOptions,
    ) -> Result<Value, ReplyError> {
        let no_handlers = || ReplyError::NoHandlers {
            address: address.to_string(),
        };

        // the lock is released before anything is awaited
        let sender = self.registry().pick(address).ok_or_else(no_handlers)?;

        // queueing behind a busy consumer counts against the same deadline
        let (reply_tx, reply_rx) = oneshot::channel();
        let delivery = async {
            sender
                .send(Envelope::new(message, reply_tx))
                .await
                .map_err(|_| no_handlers())?;

            match reply_rx.await {
                Err(_) => Err(ReplyError::NoReply),
                Ok(Ok(body)) => Ok(body),
                Ok(Err(failure)) => Err(ReplyError::Recipient {
                    code: failure.code,
                    message: failure.message,
                }),
            }
        };

        tokio::time::timeout(options.timeout, delivery)
            .await
            .unwrap_or_else(|_| {
                warn!(address, timeout = ?options.timeout, "Reply timed out");
                Err(ReplyError::Timeout {
                    address: address.to_string(),
                    after: options.timeout,
                })
            })
    }
}

/// Receiving end of a registration. Dropping it removes the registration.
pub struct MessageConsumer {
    address: String,
    id: u64,
    receiver: mpsc::Receiver<Envelope>,
    registry: Arc<Mutex<Registry>>,
}

impl MessageConsumer {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for MessageConsumer {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.address, self.id);
        debug!(address = %self.address, consumer = self.id, "Unregistered consumer");
    }
}

// a panic while holding the lock cannot leave the registry half-updated
fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
