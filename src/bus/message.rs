use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// What a sender puts on the bus: routing headers plus a JSON body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl Message {
    pub fn new(body: Value) -> Self {
        Self {
            headers: HashMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub timeout: Duration,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// A coded failure sent back by the consumer instead of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyFailure {
    pub code: i32,
    pub message: String,
}

pub(crate) type ReplySender = oneshot::Sender<Result<Value, ReplyFailure>>;

/// A delivered message as the consumer sees it. Answering consumes the
/// envelope, so every message gets at most one answer.
#[derive(Debug)]
pub struct Envelope {
    id: Uuid,
    message: Message,
    reply_to: ReplySender,
}

impl Envelope {
    pub(crate) fn new(message: Message, reply_to: ReplySender) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            reply_to,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.message.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Value {
        &self.message.body
    }

    /// Splits the envelope so the body can be moved into a handler while the
    /// reply handle stays with the caller.
    pub fn into_parts(self) -> (Message, Responder) {
        (
            self.message,
            Responder {
                id: self.id,
                reply_to: self.reply_to,
            },
        )
    }

    pub fn reply(self, body: Value) {
        self.into_parts().1.reply(body);
    }

    pub fn fail(self, code: i32, message: impl Into<String>) {
        self.into_parts().1.fail(code, message);
    }
}

#[derive(Debug)]
pub struct Responder {
    id: Uuid,
    reply_to: ReplySender,
}

impl Responder {
    pub fn id(&self) -> Uuid {
        self.id
    }

    // the sender may have timed out and gone away, which is not our problem
    pub fn reply(self, body: Value) {
        let _ = self.reply_to.send(Ok(body));
    }

    pub fn fail(self, code: i32, message: impl Into<String>) {
        let _ = self.reply_to.send(Err(ReplyFailure {
            code,
            message: message.into(),
        }));
    }
}
