//! Sample contacts and conversations for demo mode.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};

use inbox_types::models::Message;
use inbox_types::profile::{CommunicationEntry, CommunicationKind, ContactProfile, ContactStatus};

use crate::memory::MemoryBackend;

struct DemoContact {
    id: &'static str,
    name: &'static str,
    tags: &'static [&'static str],
    status: ContactStatus,
    unread: u32,
}

const CONTACTS: &[DemoContact] = &[
    DemoContact { id: "u1", name: "Alice Johnson", tags: &["VIP", "Technical"], status: ContactStatus::Open, unread: 2 },
    DemoContact { id: "u2", name: "Bob Smith", tags: &["Sales Lead"], status: ContactStatus::Resolved, unread: 0 },
    DemoContact { id: "u3", name: "Charlie Brown", tags: &["Support"], status: ContactStatus::InProgress, unread: 1 },
];

// (id, user, founder, minute past 10:00, text)
const MESSAGES: &[(i64, &str, bool, u32, &str)] = &[
    (1, "u1", false, 30, "Hi there! I need some assistance with my account."),
    (2, "u1", true, 32, "Of course, I'd be happy to help. What seems to be the issue?"),
    (3, "u1", false, 35, "I'm having trouble updating my billing information."),
    (4, "u1", false, 41, "Thanks for your help!"),
    (5, "u2", false, 12, "When can we schedule a call?"),
    (6, "u3", false, 50, "I have a question about..."),
];

fn log() -> Vec<CommunicationEntry> {
    [
        (CommunicationKind::Email, 1, "Sent welcome email"),
        (CommunicationKind::Phone, 3, "Discussed account setup"),
        (CommunicationKind::Chat, 5, "Resolved billing issue"),
    ]
    .into_iter()
    .filter_map(|(kind, day, summary)| {
        Some(CommunicationEntry {
            kind,
            date: NaiveDate::from_ymd_opt(2023, 5, day)?,
            summary: summary.to_string(),
        })
    })
    .collect()
}

pub async fn demo_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    for contact in CONTACTS {
        backend.add_user(contact.id, contact.name).await;
    }
    for &(id, user_id, is_founder, minute, text) in MESSAGES {
        let Some(created_at) = Utc.with_ymd_and_hms(2023, 5, 5, 10, minute, 0).single() else {
            continue;
        };
        backend
            .seed_message(Message {
                id,
                user_id: user_id.to_string(),
                text: text.to_string(),
                created_at,
                is_founder,
                read_at: None,
            })
            .await;
    }
    backend
}

/// Initial contact panel state, keyed by user id.
pub fn demo_profiles() -> HashMap<String, ContactProfile> {
    CONTACTS
        .iter()
        .map(|contact| {
            let last_message = MESSAGES
                .iter()
                .filter(|m| m.1 == contact.id)
                .last()
                .map(|m| m.4.to_string());
            let profile = ContactProfile {
                tags: contact.tags.iter().map(|t| t.to_string()).collect(),
                status: contact.status,
                notes: String::new(),
                log: log(),
                unread: contact.unread,
                last_message,
            };
            (contact.id.to_string(), profile)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Backend;

    #[tokio::test]
    async fn demo_data_is_consistent() {
        let backend = demo_backend().await;
        let users = backend.list_users().await.unwrap();
        let profiles = demo_profiles();

        assert_eq!(users.len(), 3);
        assert!(users.iter().all(|u| profiles.contains_key(&u.id)));
        assert_eq!(backend.list_messages("u1").await.unwrap().len(), 4);
        assert_eq!(profiles["u2"].last_message.as_deref(), Some("When can we schedule a call?"));
    }
}
