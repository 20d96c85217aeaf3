//! Typed access to the wiki database over the bus, for the HTTP side and for
//! tests. One method per action.

use crate::bus::{DeliveryOptions, EventBus, Message, ReplyError};
use crate::error::ErrorCode;
use crate::features::pages::model::{AllPagesReply, PageLookup, ACK};
use crate::features::pages::{Action, ACTION_HEADER};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

#[derive(Clone)]
pub struct WikiDbClient {
    bus: EventBus,
    address: String,
    options: DeliveryOptions,
}

impl WikiDbClient {
    pub fn new(bus: EventBus, address: impl Into<String>) -> Self {
        Self {
            bus,
            address: address.into(),
            options: DeliveryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DeliveryOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn fetch_all_pages(&self) -> Result<Vec<String>, ReplyError> {
        let reply: AllPagesReply = self.request(Action::AllPages, json!({})).await?;
        Ok(reply.pages)
    }

    pub async fn fetch_page(&self, name: &str) -> Result<PageLookup, ReplyError> {
        self.request(Action::GetPage, json!({ "page": name })).await
    }

    pub async fn create_page(&self, title: &str, markdown: &str) -> Result<(), ReplyError> {
        self.acknowledge(
            Action::CreatePage,
            json!({ "title": title, "markdown": markdown }),
        )
        .await
    }

    pub async fn save_page(&self, id: i64, markdown: &str) -> Result<(), ReplyError> {
        self.acknowledge(Action::UpdatePage, json!({ "id": id, "markdown": markdown }))
            .await
    }

    pub async fn delete_page(&self, id: i64) -> Result<(), ReplyError> {
        self.acknowledge(Action::DeletePage, json!({ "id": id })).await
    }

    async fn send(&self, action: Action, body: Value) -> Result<Value, ReplyError> {
        let message = Message::new(body).with_header(ACTION_HEADER, action.to_string());
        self.bus.send(&self.address, message, self.options).await
    }

    async fn request<T>(&self, action: Action, body: Value) -> Result<T, ReplyError>
    where
        T: DeserializeOwned,
    {
        let reply = self.send(action, body).await?;
        serde_json::from_value(reply).map_err(|e| ReplyError::Decode(e.to_string()))
    }

    async fn acknowledge(&self, action: Action, body: Value) -> Result<(), ReplyError> {
        match self.send(action, body).await? {
            Value::String(ack) if ack == ACK => Ok(()),
            other => Err(ReplyError::Decode(format!("expected \"{}\", got {}", ACK, other))),
        }
    }
}

impl ReplyError {
    /// The wiki database failure code, when this is a recipient failure with a
    /// known code.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ReplyError::Recipient { code, .. } => ErrorCode::from_code(*code),
            _ => None,
        }
    }
}
