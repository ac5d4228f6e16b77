use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Events streamed to the browser over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboxEvent {
    /// Connection accepted for this session
    Ready { user_id: String },

    /// The contact list was reloaded
    ContactsLoaded { count: usize },

    /// The operator selected a different contact
    SelectionChanged { user_id: String },

    /// A message was appended to the open thread
    MessageAppended { message: Message },

    /// Tags, status or notes of a contact changed locally
    ProfileUpdated { user_id: String },
}

impl InboxEvent {
    /// Contact the event belongs to, if it is scoped to one.
    pub fn contact_id(&self) -> Option<&str> {
        match self {
            Self::SelectionChanged { user_id } => Some(user_id),
            Self::MessageAppended { message } => Some(&message.user_id),
            Self::ProfileUpdated { user_id } => Some(user_id),
            Self::Ready { .. } | Self::ContactsLoaded { .. } => None,
        }
    }
}
