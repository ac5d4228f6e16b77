pub mod auth;
pub mod facade;
pub mod memory;
pub mod realtime;
pub mod rest;
pub mod seed;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use inbox_types::models::{Message, NewMessage, User};

pub use facade::DataFacade;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("realtime socket: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("realtime: {0}")]
    Realtime(String),

    #[error("backend unavailable")]
    Unavailable,

    #[error("authentication failed")]
    Auth,
}

/// Row access to the hosted `users` and `messages` collections.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All users ordered by name.
    async fn list_users(&self) -> Result<Vec<User>, BackendError>;

    /// Messages of one conversation, oldest first.
    async fn list_messages(&self, user_id: &str) -> Result<Vec<Message>, BackendError>;

    async fn insert_message(&self, message: NewMessage) -> Result<(), BackendError>;

    /// Push registration for rows inserted with `user_id` equal to the argument.
    async fn subscribe(&self, user_id: &str) -> Result<Subscription, BackendError>;

    /// Handle that acts with a signed-in session's credentials.
    fn scoped(&self, access_token: &str) -> Arc<dyn Backend>;
}

type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// A live push registration. Inserted rows arrive through [`Subscription::recv`].
///
/// Dropping the handle stops delivery as well, but only
/// [`Subscription::unsubscribe`] waits for the backend side to be released.
pub struct Subscription {
    id: Uuid,
    user_id: String,
    rx: mpsc::UnboundedReceiver<Message>,
    teardown: Option<Teardown>,
}

impl Subscription {
    pub fn new<F>(user_id: impl Into<String>, rx: mpsc::UnboundedReceiver<Message>, teardown: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            rx,
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Next pushed row, or `None` once the backend closed the registration.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub async fn unsubscribe(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown().await;
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .finish()
    }
}
