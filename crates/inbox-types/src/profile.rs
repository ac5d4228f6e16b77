//! Contact panel metadata.
//!
//! None of this is persisted. Each signed-in session keeps its own copy and
//! loses it on sign-out.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::User;

pub const CONTACT_PHONE: &str = "+1 234 567 890";
pub const CONTACT_JOINED: &str = "Jan 2023";
const CONTACT_EMAIL_DOMAIN: &str = "example.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContactStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 3] = [Self::Open, Self::InProgress, Self::Resolved];

    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown contact status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ContactStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunicationKind {
    Email,
    Phone,
    Chat,
}

impl fmt::Display for CommunicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Email => "Email",
            Self::Phone => "Phone",
            Self::Chat => "Chat",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationEntry {
    pub kind: CommunicationKind,
    pub date: NaiveDate,
    pub summary: String,
}

/// Mutable panel state for one contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactProfile {
    pub tags: Vec<String>,
    pub status: ContactStatus,
    pub notes: String,
    pub log: Vec<CommunicationEntry>,
    pub unread: u32,
    pub last_message: Option<String>,
}

impl ContactProfile {
    /// Appends a tag. Blank input is ignored; returns whether a tag was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }
}

/// Initials shown when a contact has no avatar: the first character of
/// every word of the display name.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect()
}

/// Placeholder address derived from the display name. Only the first space
/// becomes a dot.
pub fn contact_email(user: &User) -> String {
    let local = user.name.to_lowercase().replacen(' ', ".", 1);
    format!("{}@{}", local, CONTACT_EMAIL_DOMAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User { id: "u1".into(), name: name.into() }
    }

    #[test]
    fn initials_take_first_letter_of_each_word() {
        assert_eq!(initials("Alice Johnson"), "AJ");
        assert_eq!(initials("Charlie  van Brown"), "CvB");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn email_replaces_only_first_space() {
        assert_eq!(contact_email(&user("Alice Johnson")), "alice.johnson@example.com");
        assert_eq!(contact_email(&user("Mary Ann Lee")), "mary.ann lee@example.com");
    }

    #[test]
    fn status_parses_labels() {
        assert_eq!("In Progress".parse::<ContactStatus>(), Ok(ContactStatus::InProgress));
        assert_eq!("Resolved".parse::<ContactStatus>(), Ok(ContactStatus::Resolved));
        assert!("Closed".parse::<ContactStatus>().is_err());
    }

    #[test]
    fn blank_tags_are_rejected() {
        let mut profile = ContactProfile::default();
        assert!(!profile.add_tag("   "));
        assert!(profile.add_tag("  VIP "));
        assert_eq!(profile.tags, vec!["VIP".to_string()]);
    }
}
