//! Inbox state and its transitions.
//!
//! Nothing here performs I/O. The workspace actor feeds backend results in
//! and asks what to send out; every mutation of selection, thread, draft or
//! contact panel goes through one of these methods.

use std::collections::HashMap;

use inbox_types::models::{Message, User};
use inbox_types::profile::{ContactProfile, ContactStatus};

/// A contact row as rendered in the list.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEntry {
    pub user: User,
    pub profile: ContactProfile,
    pub selected: bool,
}

/// Read-only copy of the inbox for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboxView {
    pub contacts: Vec<ContactEntry>,
    pub selected: Option<User>,
    pub thread: Vec<Message>,
    pub draft: String,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Default)]
pub struct Inbox {
    contacts: Vec<User>,
    selected: Option<String>,
    thread: Vec<Message>,
    draft: String,
    profiles: HashMap<String, ContactProfile>,
}

impl Inbox {
    pub fn new(profiles: HashMap<String, ContactProfile>) -> Self {
        Self {
            profiles,
            ..Self::default()
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn thread(&self) -> &[Message] {
        &self.thread
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn contacts(&self) -> &[User] {
        &self.contacts
    }

    pub fn profile(&self, user_id: &str) -> Option<&ContactProfile> {
        self.profiles.get(user_id)
    }

    fn knows(&self, user_id: &str) -> bool {
        self.contacts.iter().any(|u| u.id == user_id)
    }

    /// Replaces the contact list. Nothing is selected automatically; a
    /// selected contact missing from the new list is deselected and its
    /// thread dropped. Returns whether that happened.
    pub fn contacts_loaded(&mut self, users: Vec<User>) -> bool {
        for user in &users {
            self.profiles.entry(user.id.clone()).or_default();
        }
        self.contacts = users;

        match self.selected.as_deref() {
            Some(id) if !self.knows(id) => {
                self.selected = None;
                self.thread.clear();
                true
            }
            _ => false,
        }
    }

    /// Moves the selection to `user_id` and empties the thread. Unknown
    /// contacts are refused.
    pub fn select(&mut self, user_id: &str) -> bool {
        if !self.knows(user_id) {
            return false;
        }
        self.selected = Some(user_id.to_string());
        self.thread.clear();
        if let Some(profile) = self.profiles.get_mut(user_id) {
            profile.unread = 0;
        }
        true
    }

    /// Merges fetched history into the open thread. Results for a contact
    /// that is no longer selected are discarded.
    pub fn history_loaded(&mut self, user_id: &str, history: Vec<Message>) {
        if self.selected() != Some(user_id) {
            return;
        }
        for message in history {
            if !self.contains(message.id) {
                self.thread.push(message);
            }
        }
        self.thread.sort_by_key(Message::sort_key);
        if let Some(last) = self.thread.last() {
            let text = last.text.clone();
            if let Some(profile) = self.profiles.get_mut(user_id) {
                profile.last_message = Some(text);
            }
        }
    }

    /// Applies a pushed row. Returns whether it was appended to the thread.
    pub fn receive_push(&mut self, message: Message) -> bool {
        if self.selected() != Some(message.user_id.as_str()) || self.contains(message.id) {
            return false;
        }
        if let Some(profile) = self.profiles.get_mut(&message.user_id) {
            profile.last_message = Some(message.text.clone());
        }
        let at = self
            .thread
            .partition_point(|m| m.sort_key() <= message.sort_key());
        self.thread.insert(at, message);
        true
    }

    fn contains(&self, message_id: i64) -> bool {
        self.thread.iter().any(|m| m.id == message_id)
    }

    /// Records the composer input and returns the insert to perform, if any.
    /// Blank input or no selection yields nothing.
    pub fn submission(&mut self, text: &str) -> Option<(String, String)> {
        self.draft = text.to_string();
        if text.trim().is_empty() {
            return None;
        }
        let user_id = self.selected.clone()?;
        Some((user_id, text.to_string()))
    }

    /// The draft is only cleared once the insert went through.
    pub fn send_finished(&mut self, sent: bool) {
        if sent {
            self.draft.clear();
        }
    }

    // -- Contact panel --

    /// `None` for an unknown contact, otherwise whether a tag was added.
    pub fn add_tag(&mut self, user_id: &str, tag: &str) -> Option<bool> {
        if !self.knows(user_id) {
            return None;
        }
        Some(self.profiles.entry(user_id.to_string()).or_default().add_tag(tag))
    }

    pub fn set_status(&mut self, user_id: &str, status: ContactStatus) -> bool {
        if !self.knows(user_id) {
            return false;
        }
        self.profiles.entry(user_id.to_string()).or_default().status = status;
        true
    }

    pub fn set_notes(&mut self, user_id: &str, notes: &str) -> bool {
        if !self.knows(user_id) {
            return false;
        }
        self.profiles.entry(user_id.to_string()).or_default().notes = notes.to_string();
        true
    }

    /// Snapshot for rendering. `filter` narrows the contact list by a
    /// case-insensitive name match; the selection stays visible elsewhere.
    pub fn view(&self, filter: Option<&str>) -> InboxView {
        let contacts = filter_contacts(&self.contacts, filter)
            .into_iter()
            .map(|user| ContactEntry {
                profile: self.profiles.get(&user.id).cloned().unwrap_or_default(),
                selected: self.selected() == Some(user.id.as_str()),
                user: user.clone(),
            })
            .collect();

        let selected = self
            .selected
            .as_deref()
            .and_then(|id| self.contacts.iter().find(|u| u.id == id))
            .cloned();
        let profile = selected
            .as_ref()
            .map(|u| self.profiles.get(&u.id).cloned().unwrap_or_default());

        InboxView {
            contacts,
            selected,
            thread: self.thread.clone(),
            draft: self.draft.clone(),
            profile,
        }
    }
}

pub fn filter_contacts<'a>(users: &'a [User], filter: Option<&str>) -> Vec<&'a User> {
    let needle = filter.map(str::trim).unwrap_or_default().to_lowercase();
    users
        .iter()
        .filter(|u| needle.is_empty() || u.name.to_lowercase().contains(&needle))
        .collect()
}
