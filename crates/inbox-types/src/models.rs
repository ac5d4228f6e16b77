use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A contact as stored by the hosted backend. Read-only to this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// A row of the `messages` collection.
///
/// Rows are immutable once created. `read_at` is the only column that may
/// change upstream and nothing here ever sets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub is_founder: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Thread ordering key: creation time, then id for rows sharing a timestamp.
    pub fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

/// Insert payload. The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub user_id: String,
    pub text: String,
    pub is_founder: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl NewMessage {
    /// A message written by the operator side of the conversation.
    pub fn from_founder(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            is_founder: true,
            read_at: None,
        }
    }

    /// A message written by the contact, delivered out-of-band.
    pub fn from_contact(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            is_founder: false,
            read_at: None,
        }
    }
}

/// Claims carried by a session token.
///
/// Hosted tokens carry more fields than these; unknown ones are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub aud: String,
    pub exp: usize,
}

/// An issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub claims: SessionClaims,
}

impl Session {
    /// Key identifying this sign-in.
    pub fn key(&self) -> String {
        session_key(&self.claims, &self.access_token)
    }
}

/// The token's session id, or a digest of the token itself for tokens issued
/// without one. Never the subject: one user may hold several sessions.
pub fn session_key(claims: &SessionClaims, token: &str) -> String {
    match &claims.session_id {
        Some(id) => id.clone(),
        None => hex::encode(Sha256::digest(token.as_bytes())),
    }
}
