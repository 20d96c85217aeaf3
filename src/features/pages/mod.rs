pub mod client;
pub mod model;

use crate::bus::{Envelope, MessageConsumer};
use crate::database::PageRepository;
use crate::error::{ErrorCode, Result, WikiDbError};
use derive_more::Display;
use model::{
    parse_body, required_id, AllPagesReply, CreatePageRequest, DeletePageRequest,
    GetPageRequest, UpdatePageRequest, ACK,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const ACTION_HEADER: &str = "action";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Action {
    #[display("all-pages")]
    AllPages,
    #[display("get-page")]
    GetPage,
    #[display("create-page")]
    CreatePage,
    #[display("update-page")]
    UpdatePage,
    #[display("delete-page")]
    DeletePage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::AllPages,
        Action::GetPage,
        Action::CreatePage,
        Action::UpdatePage,
        Action::DeletePage,
    ];

    fn handler(self) -> Handler {
        match self {
            Action::AllPages => all_pages_handler,
            Action::GetPage => get_page_handler,
            Action::CreatePage => create_page_handler,
            Action::UpdatePage => update_page_handler,
            Action::DeletePage => delete_page_handler,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(tag: &str) -> std::result::Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.to_string() == tag)
            .ok_or_else(|| tag.to_string())
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type Handler = fn(Arc<dyn PageRepository>, Value) -> HandlerFuture;

/// Routes action-tagged messages to the page repository. Cheap to clone, every
/// clone shares the same route table and repository.
#[derive(Clone)]
pub struct Dispatcher {
    repo: Arc<dyn PageRepository>,
    routes: Arc<HashMap<Action, Handler>>,
}

impl Dispatcher {
    pub fn new(repo: Arc<dyn PageRepository>) -> Self {
        let routes: HashMap<Action, Handler> = Action::ALL
            .into_iter()
            .map(|action| (action, action.handler()))
            .collect();

        Self {
            repo,
            routes: Arc::new(routes),
        }
    }

    pub async fn on_message(&self, envelope: Envelope) {
        let tag = match envelope.header(ACTION_HEADER) {
            Some(tag) => tag.to_string(),
            None => {
                warn!(message = %envelope.id(), "Rejected message without action header");
                envelope.fail(
                    ErrorCode::NoActionSpecified.code(),
                    "No action header specified",
                );
                return;
            }
        };

        let handler = match Action::from_str(&tag)
            .ok()
            .and_then(|action| self.routes.get(&action))
        {
            Some(handler) => *handler,
            None => {
                warn!(message = %envelope.id(), action = %tag, "Rejected unknown action");
                envelope.fail(ErrorCode::BadAction.code(), format!("Bad action: {}", tag));
                return;
            }
        };

        debug!(message = %envelope.id(), action = %tag, "Routing message");

        let (message, responder) = envelope.into_parts();
        match handler(self.repo.clone(), message.body).await {
            Ok(reply) => responder.reply(reply),
            Err(e) => {
                // already logged where the statement failed
                debug!(message = %responder.id(), action = %tag, error = %e, "Replying with failure");
                responder.fail(ErrorCode::DbError.code(), e.cause_message());
            }
        }
    }

    /// Serves `consumer` until `shutdown` flips to true or the consumer is
    /// closed. Each message runs on its own task. The consumer is dropped, and
    /// so unregistered, when the loop ends.
    pub fn spawn(
        self,
        mut consumer: MessageConsumer,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(address = consumer.address(), "Dispatcher listening");
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    received = consumer.recv() => {
                        let Some(envelope) = received else { break };
                        let dispatcher = self.clone();
                        tokio::spawn(async move { dispatcher.on_message(envelope).await });
                    }
                }
            }
            debug!(address = consumer.address(), "Dispatcher stopped");
        })
    }
}

fn all_pages_handler(repo: Arc<dyn PageRepository>, _body: Value) -> HandlerFuture {
    Box::pin(async move {
        let pages = repo.fetch_all_titles().await?;
        to_reply(&AllPagesReply { pages })
    })
}

fn get_page_handler(repo: Arc<dyn PageRepository>, body: Value) -> HandlerFuture {
    Box::pin(async move {
        let request: GetPageRequest = parse_body(body)?;
        let lookup = repo.fetch_page(request.page.as_deref()).await?;
        to_reply(&lookup)
    })
}

fn create_page_handler(repo: Arc<dyn PageRepository>, body: Value) -> HandlerFuture {
    Box::pin(async move {
        let request: CreatePageRequest = parse_body(body)?;
        repo.create_page(request.title.as_deref(), request.markdown.as_deref())
            .await?;
        Ok(Value::from(ACK))
    })
}

fn update_page_handler(repo: Arc<dyn PageRepository>, body: Value) -> HandlerFuture {
    Box::pin(async move {
        let request: UpdatePageRequest = parse_body(body)?;
        let id = required_id(request.id.as_ref())?;
        repo.save_page(id, request.markdown.as_deref()).await?;
        Ok(Value::from(ACK))
    })
}

fn delete_page_handler(repo: Arc<dyn PageRepository>, body: Value) -> HandlerFuture {
    Box::pin(async move {
        let request: DeletePageRequest = parse_body(body)?;
        let id = required_id(request.id.as_ref())?;
        repo.delete_page(id).await?;
        Ok(Value::from(ACK))
    })
}

fn to_reply<T: serde::Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload)
        .map_err(|e| WikiDbError::Parameter(format!("Unencodable reply: {}", e)))
}
