//! Session issuance and lookup.
//!
//! Tokens are HS256 JWTs in both modes, so lookup never leaves the process:
//! the signature, expiry and audience are checked locally and signed-out
//! sessions are remembered in a revocation set.

use std::collections::HashMap;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use inbox_types::models::{Session, SessionClaims, session_key};

use crate::BackendError;
use crate::rest::check;

/// Audience the hosted auth service puts on user tokens.
pub const SESSION_AUDIENCE: &str = "authenticated";

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// Claims of a live session. Any failure reads as "no session".
    async fn verify(&self, token: &str) -> Option<SessionClaims>;

    /// Ends the session. Upstream failures are logged; the session is
    /// revoked locally regardless.
    async fn sign_out(&self, session: &Session);
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    /// Signed-out session keys and the expiry of their token.
    revoked: RwLock<HashMap<String, usize>>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SESSION_AUDIENCE]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    pub async fn verify(&self, token: &str) -> Option<SessionClaims> {
        let claims = decode::<SessionClaims>(token, &self.key, &self.validation)
            .ok()?
            .claims;
        if self.revoked.read().await.contains_key(&session_key(&claims, token)) {
            return None;
        }
        Some(claims)
    }

    /// Remembers a signed-out session until its token would have expired
    /// anyway. Entries past that point are dropped.
    pub async fn revoke(&self, session: &Session) {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        if session.claims.exp > now {
            revoked.insert(session.key(), session.claims.exp);
        }
    }

    pub async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }
}

// -- Local --

/// Single operator account for demo mode and tests.
pub struct LocalAuth {
    email: String,
    password_hash: String,
    user_id: String,
    secret: String,
    ttl: chrono::Duration,
    verifier: TokenVerifier,
}

impl LocalAuth {
    pub fn new(email: &str, password: &str, secret: &str) -> anyhow::Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash operator password: {}", e))?
            .to_string();

        Ok(Self {
            email: email.to_lowercase(),
            password_hash,
            user_id: Uuid::new_v4().to_string(),
            secret: secret.to_string(),
            ttl: chrono::Duration::hours(12),
            verifier: TokenVerifier::new(secret),
        })
    }

    fn create_token(&self) -> Result<Session, BackendError> {
        let claims = SessionClaims {
            sub: self.user_id.clone(),
            email: Some(self.email.clone()),
            session_id: Some(Uuid::new_v4().to_string()),
            aud: SESSION_AUDIENCE.into(),
            exp: (chrono::Utc::now() + self.ttl).timestamp() as usize,
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            warn!("Failed to sign session token: {}", e);
            BackendError::Auth
        })?;

        Ok(Session { access_token, claims })
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        if !email.trim().eq_ignore_ascii_case(&self.email) {
            return Err(BackendError::Auth);
        }

        let parsed_hash = PasswordHash::new(&self.password_hash).map_err(|_| BackendError::Auth)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| BackendError::Auth)?;

        let session = self.create_token()?;
        info!("{} signed in", self.email);
        Ok(session)
    }

    async fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.verifier.verify(token).await
    }

    async fn sign_out(&self, session: &Session) {
        self.verifier.revoke(session).await;
        info!("{} signed out", self.email);
    }
}

// -- Hosted --

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Hosted auth service (GoTrue-compatible endpoints).
pub struct RestAuth {
    client: Client,
    base_url: String,
    api_key: String,
    verifier: TokenVerifier,
}

impl RestAuth {
    pub fn new(client: Client, base_url: &str, api_key: &str, jwt_secret: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            verifier: TokenVerifier::new(jwt_secret),
        }
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let resp = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&PasswordGrant { email: email.trim(), password })
            .send()
            .await?;

        if resp.status().is_client_error() {
            return Err(BackendError::Auth);
        }
        let token: TokenResponse = check(resp).await?.json().await?;

        let claims = self
            .verifier
            .verify(&token.access_token)
            .await
            .ok_or(BackendError::Auth)?;

        Ok(Session {
            access_token: token.access_token,
            claims,
        })
    }

    async fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.verifier.verify(token).await
    }

    async fn sign_out(&self, session: &Session) {
        self.verifier.revoke(session).await;

        let result = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;

        match result {
            Ok(resp) => {
                if let Err(e) = check(resp).await {
                    warn!("Upstream sign-out failed: {}", e);
                }
            }
            Err(e) => warn!("Upstream sign-out failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn auth() -> LocalAuth {
        LocalAuth::new("founder@example.com", "correct horse", SECRET).unwrap()
    }

    #[tokio::test]
    async fn sign_in_issues_verifiable_token() {
        let auth = auth();
        let session = auth.sign_in("Founder@Example.com ", "correct horse").await.unwrap();

        let claims = auth.verify(&session.access_token).await.unwrap();
        assert_eq!(claims, session.claims);
        assert_eq!(claims.aud, SESSION_AUDIENCE);
    }

    #[tokio::test]
    async fn wrong_credentials_are_rejected() {
        let auth = auth();
        assert!(matches!(auth.sign_in("founder@example.com", "nope").await, Err(BackendError::Auth)));
        assert!(matches!(auth.sign_in("other@example.com", "correct horse").await, Err(BackendError::Auth)));
    }

    #[tokio::test]
    async fn signed_out_token_no_longer_verifies() {
        let auth = auth();
        let first = auth.sign_in("founder@example.com", "correct horse").await.unwrap();
        let second = auth.sign_in("founder@example.com", "correct horse").await.unwrap();

        auth.sign_out(&first).await;
        assert!(auth.verify(&first.access_token).await.is_none());
        assert!(auth.verify(&second.access_token).await.is_some());
    }

    #[tokio::test]
    async fn foreign_and_garbage_tokens_fail() {
        let auth = auth();
        let other = LocalAuth::new("founder@example.com", "correct horse", "other-secret").unwrap();
        let foreign = other.sign_in("founder@example.com", "correct horse").await.unwrap();

        assert!(auth.verify(&foreign.access_token).await.is_none());
        assert!(auth.verify("not-a-jwt").await.is_none());
    }

    fn token_for(claims: &SessionClaims) -> Session {
        let access_token =
            encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        Session { access_token, claims: claims.clone() }
    }

    fn claims_expiring_in(hours: i64) -> SessionClaims {
        SessionClaims {
            sub: "user-1".into(),
            email: None,
            session_id: None,
            aud: SESSION_AUDIENCE.into(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(hours)).timestamp() as usize,
        }
    }

    #[tokio::test]
    async fn sign_out_without_session_id_spares_other_sessions() {
        let verifier = TokenVerifier::new(SECRET);
        let first = token_for(&claims_expiring_in(1));
        let second = token_for(&claims_expiring_in(2));

        verifier.revoke(&first).await;
        assert!(verifier.verify(&first.access_token).await.is_none());
        assert!(verifier.verify(&second.access_token).await.is_some());
    }

    #[tokio::test]
    async fn revocations_are_dropped_after_expiry() {
        let verifier = TokenVerifier::new(SECRET);
        verifier.revoke(&token_for(&claims_expiring_in(-1))).await;
        assert_eq!(verifier.revoked_count().await, 0);

        verifier.revoke(&token_for(&claims_expiring_in(1))).await;
        verifier.revoke(&token_for(&claims_expiring_in(2))).await;
        assert_eq!(verifier.revoked_count().await, 2);
    }

    #[tokio::test]
    async fn expired_token_fails() {
        let auth = auth();
        let claims = SessionClaims {
            sub: "u".into(),
            email: None,
            session_id: None,
            aud: SESSION_AUDIENCE.into(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        assert!(auth.verify(&token).await.is_none());
    }
}
