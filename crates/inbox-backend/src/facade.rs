//! Call-through layer between the inbox workspace and a [`Backend`].
//!
//! Failures are logged here and reported as "nothing happened": callers keep
//! whatever state they already had.

use std::sync::Arc;

use tracing::error;

use inbox_types::models::{Message, NewMessage, User};

use crate::{Backend, Subscription};

#[derive(Clone)]
pub struct DataFacade {
    backend: Arc<dyn Backend>,
}

impl DataFacade {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn list_users(&self) -> Option<Vec<User>> {
        match self.backend.list_users().await {
            Ok(users) => Some(users),
            Err(e) => {
                error!("Failed to list users: {}", e);
                None
            }
        }
    }

    pub async fn list_messages(&self, user_id: &str) -> Option<Vec<Message>> {
        match self.backend.list_messages(user_id).await {
            Ok(messages) => Some(messages),
            Err(e) => {
                error!("Failed to list messages for user {}: {}", user_id, e);
                None
            }
        }
    }

    /// Inserts a founder message. Returns whether the insert succeeded.
    pub async fn send_message(&self, user_id: &str, text: &str) -> bool {
        match self.backend.insert_message(NewMessage::from_founder(user_id, text)).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send message to user {}: {}", user_id, e);
                false
            }
        }
    }

    pub async fn subscribe(&self, user_id: &str) -> Option<Subscription> {
        match self.backend.subscribe(user_id).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                error!("Failed to subscribe to messages of user {}: {}", user_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn failures_read_as_nothing() {
        let backend = MemoryBackend::new();
        backend.add_user("u1", "Alice").await;
        let facade = DataFacade::new(Arc::new(backend.clone()));
        assert_eq!(facade.list_users().await.map(|u| u.len()), Some(1));

        backend.set_failing(true);
        assert!(facade.list_users().await.is_none());
        assert!(facade.list_messages("u1").await.is_none());
        assert!(facade.subscribe("u1").await.is_none());
        assert!(!facade.send_message("u1", "hello").await);
    }

    #[tokio::test]
    async fn send_inserts_founder_row() {
        let backend = MemoryBackend::new();
        let facade = DataFacade::new(Arc::new(backend.clone()));

        assert!(facade.send_message("u1", "thanks").await);
        let stored = backend.messages().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].user_id, "u1");
        assert!(stored[0].is_founder);
    }
}
