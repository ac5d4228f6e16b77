//! Process-local stand-in for the hosted backend, used by demo mode and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use inbox_types::models::{Message, NewMessage, User};

use crate::{Backend, BackendError, Subscription};

type Subscribers = RwLock<HashMap<Uuid, (String, mpsc::UnboundedSender<Message>)>>;

#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: RwLock<Vec<User>>,
    messages: RwLock<Vec<Message>>,
    next_id: AtomicI64,

    /// Push registrations: subscription id -> (user_id filter, sender)
    subscribers: Arc<Subscribers>,

    failing: AtomicBool,
    inserts: AtomicUsize,
    subscribes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, id: impl Into<String>, name: impl Into<String>) {
        self.inner.users.write().await.push(User {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Stores a pre-built row without notifying subscribers. Keeps id
    /// assignment ahead of every seeded id.
    pub async fn seed_message(&self, message: Message) {
        self.inner.next_id.fetch_max(message.id, Ordering::Relaxed);
        self.inner.messages.write().await.push(message);
    }

    /// Inserts a message written by the contact, as the counterparty's own
    /// client would.
    pub async fn deliver_from_contact(&self, user_id: &str, text: &str) -> Result<Message, BackendError> {
        self.store(NewMessage::from_contact(user_id, text)).await
    }

    /// Makes every subsequent call fail with [`BackendError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::Relaxed);
    }

    /// Number of registrations not yet torn down.
    pub async fn active_subscriptions(&self) -> usize {
        self.inner.subscribers.read().await.len()
    }

    /// User ids of the registrations not yet torn down.
    pub async fn subscribed_users(&self) -> Vec<String> {
        self.inner
            .subscribers
            .read()
            .await
            .values()
            .map(|(user_id, _)| user_id.clone())
            .collect()
    }

    /// Successful inserts since creation.
    pub fn insert_count(&self) -> usize {
        self.inner.inserts.load(Ordering::Relaxed)
    }

    /// Subscriptions registered since creation, torn down or not.
    pub fn subscribe_count(&self) -> usize {
        self.inner.subscribes.load(Ordering::Relaxed)
    }

    /// Deletes a contact out-of-band. Their messages stay.
    pub async fn remove_user(&self, id: &str) {
        self.inner.users.write().await.retain(|u| u.id != id);
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.inner.messages.read().await.clone()
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.inner.failing.load(Ordering::Relaxed) {
            return Err(BackendError::Unavailable);
        }
        Ok(())
    }

    async fn store(&self, new: NewMessage) -> Result<Message, BackendError> {
        self.check_available()?;

        let message = Message {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            user_id: new.user_id,
            text: new.text,
            created_at: Utc::now(),
            is_founder: new.is_founder,
            read_at: None,
        };
        self.inner.messages.write().await.push(message.clone());
        self.inner.inserts.fetch_add(1, Ordering::Relaxed);

        self.fan_out(&message).await;
        Ok(message)
    }

    async fn fan_out(&self, message: &Message) {
        let mut closed = Vec::new();
        {
            let subscribers = self.inner.subscribers.read().await;
            for (id, (user_id, tx)) in subscribers.iter() {
                if *user_id == message.user_id && tx.send(message.clone()).is_err() {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.inner.subscribers.write().await;
            for id in closed {
                subscribers.remove(&id);
            }
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_users(&self) -> Result<Vec<User>, BackendError> {
        self.check_available()?;
        let mut users = self.inner.users.read().await.clone();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn list_messages(&self, user_id: &str) -> Result<Vec<Message>, BackendError> {
        self.check_available()?;
        let mut messages: Vec<Message> = self
            .inner
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        messages.sort_by_key(Message::sort_key);
        Ok(messages)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<(), BackendError> {
        self.store(message).await.map(|_| ())
    }

    async fn subscribe(&self, user_id: &str) -> Result<Subscription, BackendError> {
        self.check_available()?;

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .write()
            .await
            .insert(id, (user_id.to_string(), tx));
        self.inner.subscribes.fetch_add(1, Ordering::Relaxed);
        debug!("memory backend: subscription {} for user {}", id, user_id);

        let subscribers = self.inner.subscribers.clone();
        Ok(Subscription::new(user_id, rx, move || {
            Box::pin(async move {
                subscribers.write().await.remove(&id);
            })
        }))
    }

    fn scoped(&self, _access_token: &str) -> Arc<dyn Backend> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn message(id: i64, user_id: &str, minute: u32) -> Message {
        Message {
            id,
            user_id: user_id.into(),
            text: format!("m{}", id),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
            is_founder: false,
            read_at: None,
        }
    }

    #[tokio::test]
    async fn users_are_ordered_by_name() {
        let backend = MemoryBackend::new();
        backend.add_user("u2", "Bob").await;
        backend.add_user("u1", "Alice").await;

        let names: Vec<String> = backend.list_users().await.unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn messages_are_isolated_per_conversation_and_ordered() {
        let backend = MemoryBackend::new();
        backend.seed_message(message(2, "u1", 32)).await;
        backend.seed_message(message(1, "u1", 30)).await;
        backend.seed_message(message(3, "u2", 31)).await;
        backend.insert_message(NewMessage::from_founder("u2", "to bob")).await.unwrap();

        let ids: Vec<i64> = backend.list_messages("u1").await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn inserted_ids_follow_seeded_ids() {
        let backend = MemoryBackend::new();
        backend.seed_message(message(7, "u1", 30)).await;
        backend.insert_message(NewMessage::from_founder("u1", "hi")).await.unwrap();

        let last = backend.messages().await.pop().unwrap();
        assert_eq!(last.id, 8);
        assert!(last.is_founder);
        assert!(last.read_at.is_none());
    }

    #[tokio::test]
    async fn subscribers_receive_only_matching_rows() {
        let backend = MemoryBackend::new();
        let mut alice = backend.subscribe("u1").await.unwrap();

        backend.deliver_from_contact("u2", "not for alice").await.unwrap();
        backend.deliver_from_contact("u1", "for alice").await.unwrap();

        let pushed = alice.recv().await.unwrap();
        assert_eq!(pushed.text, "for alice");
        assert!(alice.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_releases_registration() {
        let backend = MemoryBackend::new();
        let sub = backend.subscribe("u1").await.unwrap();
        assert_eq!(backend.active_subscriptions().await, 1);

        sub.unsubscribe().await;
        assert_eq!(backend.active_subscriptions().await, 0);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned_on_next_insert() {
        let backend = MemoryBackend::new();
        drop(backend.subscribe("u1").await.unwrap());

        backend.deliver_from_contact("u1", "hello").await.unwrap();
        assert_eq!(backend.active_subscriptions().await, 0);
    }

    #[tokio::test]
    async fn failing_backend_rejects_every_call() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);

        assert!(matches!(backend.list_users().await, Err(BackendError::Unavailable)));
        assert!(backend.subscribe("u1").await.is_err());
        assert!(backend.insert_message(NewMessage::from_founder("u1", "x")).await.is_err());
        assert_eq!(backend.insert_count(), 0);
    }
}
