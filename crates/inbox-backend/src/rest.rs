use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;

use inbox_types::models::{Message, NewMessage, User};

use crate::{Backend, BackendError, Subscription, realtime};

/// Hosted backend reached over its PostgREST endpoint and realtime socket.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
    /// Session token; the project key is used until a session is attached.
    access_token: Option<String>,
}

impl RestBackend {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }
}

/// Turns a non-2xx reply into [`BackendError::Status`] carrying the body.
pub(crate) async fn check(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Backend for RestBackend {
    async fn list_users(&self) -> Result<Vec<User>, BackendError> {
        let resp = self
            .request(Method::GET, "users")
            .query(&[("select", "id,name"), ("order", "name.asc")])
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn list_messages(&self, user_id: &str) -> Result<Vec<Message>, BackendError> {
        let filter = format!("eq.{}", user_id);
        let resp = self
            .request(Method::GET, "messages")
            .query(&[
                ("select", "*"),
                ("user_id", filter.as_str()),
                ("order", "created_at.asc"),
            ])
            .send()
            .await?;
        let messages: Vec<Message> = check(resp).await?.json().await?;
        debug!("Fetched {} messages for user {}", messages.len(), user_id);
        Ok(messages)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<(), BackendError> {
        let resp = self
            .request(Method::POST, "messages")
            .header("Prefer", "return=minimal")
            .json(&message)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn subscribe(&self, user_id: &str) -> Result<Subscription, BackendError> {
        let url = realtime::socket_url(&self.base_url, &self.api_key);
        realtime::subscribe(&url, user_id, self.bearer()).await
    }

    fn scoped(&self, access_token: &str) -> Arc<dyn Backend> {
        Arc::new(Self {
            access_token: Some(access_token.to_string()),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_carry_key_and_session_token() {
        let backend = RestBackend::new(Client::new(), "https://abc.example.co/", "anon");
        let anon = backend.request(Method::GET, "users").build().unwrap();
        assert_eq!(anon.url().as_str(), "https://abc.example.co/rest/v1/users");
        assert_eq!(anon.headers()["apikey"], "anon");
        assert_eq!(anon.headers()["authorization"], "Bearer anon");

        let scoped = RestBackend {
            access_token: Some("session-jwt".into()),
            ..backend
        };
        let req = scoped.request(Method::POST, "messages").build().unwrap();
        assert_eq!(req.headers()["authorization"], "Bearer session-jwt");
    }

    #[test]
    fn new_message_body_marks_founder_and_unread() {
        let body = serde_json::to_value(NewMessage::from_founder("u1", "thanks")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"user_id": "u1", "text": "thanks", "is_founder": true, "read_at": null})
        );
    }
}
