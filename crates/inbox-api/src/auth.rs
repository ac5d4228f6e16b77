use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Extension, Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tracing::{info, warn};

use inbox_backend::auth::AuthProvider;
use inbox_backend::{Backend, BackendError, DataFacade};
use inbox_gateway::registry::WorkspaceRegistry;
use inbox_gateway::workspace::Workspace;
use inbox_types::api::{SignInForm, SignInQuery};
use inbox_types::models::Session;
use inbox_types::profile::ContactProfile;

use crate::middleware::{HOME_PATH, SESSION_COOKIE, SIGN_IN_PATH};
use crate::views;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub auth: Arc<dyn AuthProvider>,
    pub backend: Arc<dyn Backend>,
    pub workspaces: WorkspaceRegistry,
    /// Contact panel state every new workspace starts from.
    pub profiles: HashMap<String, ContactProfile>,
    pub secure_cookies: bool,
}

impl AppStateInner {
    /// The session's workspace, started on first use with the session's
    /// credentials.
    pub async fn workspace(&self, session: &Session) -> Workspace {
        self.workspaces
            .get_or_spawn(&session.key(), session.claims.exp, || {
                let facade = DataFacade::new(self.backend.scoped(&session.access_token));
                Workspace::spawn(session.claims.sub.clone(), facade, self.profiles.clone())
            })
            .await
    }
}

const SIGN_IN_FAILED_PATH: &str = "/auth/signin?error=1";

pub async fn sign_in_page(Query(query): Query<SignInQuery>) -> Html<String> {
    Html(views::sign_in_page(query.error.is_some()))
}

pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> impl IntoResponse {
    let session = match state.auth.sign_in(&form.email, &form.password).await {
        Ok(session) => session,
        Err(BackendError::Auth) => {
            info!("Rejected sign-in for {}", form.email.trim());
            return (jar, Redirect::to(SIGN_IN_FAILED_PATH));
        }
        Err(e) => {
            warn!("Sign-in for {} failed: {}", form.email.trim(), e);
            return (jar, Redirect::to(SIGN_IN_FAILED_PATH));
        }
    };

    let cookie = Cookie::build((SESSION_COOKIE, session.access_token))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax);

    (jar.add(cookie), Redirect::to(HOME_PATH))
}

/// Ends the session upstream, stops its workspace and clears the cookie.
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> impl IntoResponse {
    state.auth.sign_out(&session).await;
    state.workspaces.remove(&session.key()).await;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to(SIGN_IN_PATH))
}
