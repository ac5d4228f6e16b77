use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use inbox_backend::{DataFacade, Subscription};
use inbox_types::events::InboxEvent;
use inbox_types::models::Message;
use inbox_types::profile::{ContactProfile, ContactStatus};

use crate::controller::{Inbox, InboxView};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
#[error("workspace is no longer running")]
pub struct WorkspaceClosed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The insert went through; the row arrives through the subscription.
    Sent,
    /// The insert failed; the draft is kept.
    Failed,
    /// Blank input or no contact selected; nothing was sent.
    Ignored,
}

enum Command {
    Refresh { reply: oneshot::Sender<()> },
    Select { user_id: String, reply: oneshot::Sender<bool> },
    Submit { text: String, reply: oneshot::Sender<SubmitOutcome> },
    AddTag { user_id: String, tag: String, reply: oneshot::Sender<Option<bool>> },
    SetStatus { user_id: String, status: ContactStatus, reply: oneshot::Sender<bool> },
    SetNotes { user_id: String, notes: String, reply: oneshot::Sender<bool> },
    Snapshot { filter: Option<String>, reply: oneshot::Sender<InboxView> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Handle to one signed-in operator's inbox.
///
/// The state lives in a single task; every transition is a command sent to
/// it, and pushed rows from the active subscription are a second input of
/// the same loop.
#[derive(Clone)]
pub struct Workspace {
    operator_id: String,
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<InboxEvent>,
}

impl Workspace {
    pub fn spawn(
        operator_id: impl Into<String>,
        facade: DataFacade,
        profiles: HashMap<String, ContactProfile>,
    ) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = WorkspaceActor {
            facade,
            inbox: Inbox::new(profiles),
            subscription: None,
            events: events.clone(),
        };
        tokio::spawn(actor.run(rx));

        Self {
            operator_id: operator_id.into(),
            commands,
            events,
        }
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<InboxEvent> {
        self.events.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, WorkspaceClosed> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| WorkspaceClosed)?;
        rx.await.map_err(|_| WorkspaceClosed)
    }

    /// Reloads the contact list. A failed fetch keeps the previous list.
    pub async fn refresh(&self) -> Result<(), WorkspaceClosed> {
        self.request(|reply| Command::Refresh { reply }).await
    }

    /// Switches the open conversation. Returns false for an unknown contact.
    pub async fn select(&self, user_id: &str) -> Result<bool, WorkspaceClosed> {
        let user_id = user_id.to_string();
        self.request(|reply| Command::Select { user_id, reply }).await
    }

    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome, WorkspaceClosed> {
        let text = text.to_string();
        self.request(|reply| Command::Submit { text, reply }).await
    }

    pub async fn add_tag(&self, user_id: &str, tag: &str) -> Result<Option<bool>, WorkspaceClosed> {
        let (user_id, tag) = (user_id.to_string(), tag.to_string());
        self.request(|reply| Command::AddTag { user_id, tag, reply }).await
    }

    pub async fn set_status(&self, user_id: &str, status: ContactStatus) -> Result<bool, WorkspaceClosed> {
        let user_id = user_id.to_string();
        self.request(|reply| Command::SetStatus { user_id, status, reply }).await
    }

    pub async fn set_notes(&self, user_id: &str, notes: &str) -> Result<bool, WorkspaceClosed> {
        let (user_id, notes) = (user_id.to_string(), notes.to_string());
        self.request(|reply| Command::SetNotes { user_id, notes, reply }).await
    }

    pub async fn snapshot(&self, filter: Option<&str>) -> Result<InboxView, WorkspaceClosed> {
        let filter = filter.map(str::to_string);
        self.request(|reply| Command::Snapshot { filter, reply }).await
    }

    /// Stops the task after tearing down its subscription.
    pub async fn shutdown(&self) {
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
    }
}

struct WorkspaceActor {
    facade: DataFacade,
    inbox: Inbox,
    subscription: Option<Subscription>,
    events: broadcast::Sender<InboxEvent>,
}

async fn next_push(subscription: &mut Option<Subscription>) -> Option<Message> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

impl WorkspaceActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd).await {
                        break;
                    }
                }
                pushed = next_push(&mut self.subscription) => {
                    match pushed {
                        Some(message) => self.receive(message),
                        None => {
                            warn!("Message subscription closed by backend");
                            self.subscription = None;
                        }
                    }
                }
            }
        }

        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe().await;
        }
        debug!("Workspace stopped");
    }

    fn emit(&self, event: InboxEvent) {
        let _ = self.events.send(event);
    }

    /// Returns false once the workspace should stop.
    async fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Refresh { reply } => {
                if let Some(users) = self.facade.list_users().await {
                    let count = users.len();
                    if self.inbox.contacts_loaded(users) {
                        self.release_subscription().await;
                    }
                    self.emit(InboxEvent::ContactsLoaded { count });
                }
                let _ = reply.send(());
            }
            Command::Select { user_id, reply } => {
                let selected = self.select(&user_id).await;
                let _ = reply.send(selected);
            }
            Command::Submit { text, reply } => {
                let outcome = self.submit(&text).await;
                let _ = reply.send(outcome);
            }
            Command::AddTag { user_id, tag, reply } => {
                let added = self.inbox.add_tag(&user_id, &tag);
                if added == Some(true) {
                    self.emit(InboxEvent::ProfileUpdated { user_id });
                }
                let _ = reply.send(added);
            }
            Command::SetStatus { user_id, status, reply } => {
                let known = self.inbox.set_status(&user_id, status);
                if known {
                    self.emit(InboxEvent::ProfileUpdated { user_id });
                }
                let _ = reply.send(known);
            }
            Command::SetNotes { user_id, notes, reply } => {
                let known = self.inbox.set_notes(&user_id, &notes);
                if known {
                    self.emit(InboxEvent::ProfileUpdated { user_id });
                }
                let _ = reply.send(known);
            }
            Command::Snapshot { filter, reply } => {
                let _ = reply.send(self.inbox.view(filter.as_deref()));
            }
            Command::Shutdown { reply } => {
                self.release_subscription().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Tears down the previous subscription, registers the new one, then
    /// fetches history. Rows pushed while the fetch is in flight are merged
    /// by id, so nothing inserted in between is lost.
    async fn select(&mut self, user_id: &str) -> bool {
        // Reopening the live conversation keeps its subscription and thread.
        if self.inbox.selected() == Some(user_id) && self.subscription.is_some() {
            return true;
        }
        if !self.inbox.select(user_id) {
            return false;
        }

        self.release_subscription().await;
        self.subscription = self.facade.subscribe(user_id).await;

        if let Some(history) = self.facade.list_messages(user_id).await {
            self.inbox.history_loaded(user_id, history);
        }

        info!("Selected contact {} ({} messages)", user_id, self.inbox.thread().len());
        self.emit(InboxEvent::SelectionChanged {
            user_id: user_id.to_string(),
        });
        true
    }

    async fn release_subscription(&mut self) {
        if let Some(previous) = self.subscription.take() {
            debug!("Tearing down subscription for user {}", previous.user_id());
            previous.unsubscribe().await;
        }
    }

    async fn submit(&mut self, text: &str) -> SubmitOutcome {
        let Some((user_id, text)) = self.inbox.submission(text) else {
            return SubmitOutcome::Ignored;
        };

        let sent = self.facade.send_message(&user_id, &text).await;
        self.inbox.send_finished(sent);
        if sent {
            SubmitOutcome::Sent
        } else {
            SubmitOutcome::Failed
        }
    }

    fn receive(&mut self, message: Message) {
        if self.inbox.receive_push(message.clone()) {
            self.emit(InboxEvent::MessageAppended { message });
        }
    }
}
