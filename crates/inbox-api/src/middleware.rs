use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use inbox_types::models::Session;

use crate::auth::AppState;

pub const SESSION_COOKIE: &str = "inbox_session";
pub const HOME_PATH: &str = "/";
pub const SIGN_IN_PATH: &str = "/auth/signin";

const AUTH_ZONE: &str = "/auth/";

/// Paths served without a session check. Entries ending in `/` are prefixes.
const UNGUARDED: &[&str] = &["/assets/", "/favicon.ico", "/health"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

pub fn is_auth_zone(path: &str) -> bool {
    path.starts_with(AUTH_ZONE)
}

pub fn is_unguarded(path: &str) -> bool {
    UNGUARDED.iter().any(|entry| {
        if entry.ends_with('/') {
            path.starts_with(entry)
        } else {
            path == *entry
        }
    })
}

/// Where a request may go, given only its path and whether it carries a
/// live session.
pub fn decide(path: &str, session_present: bool) -> GuardDecision {
    match (is_auth_zone(path), session_present) {
        (true, true) => GuardDecision::Redirect(HOME_PATH),
        (true, false) => GuardDecision::Allow,
        (false, false) => GuardDecision::Redirect(SIGN_IN_PATH),
        (false, true) => GuardDecision::Allow,
    }
}

/// Session guard in front of every route. A missing, forged, expired or
/// signed-out token all count as no session. Allowed requests carry the
/// [`Session`] as an extension.
pub async fn session_guard(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if is_unguarded(&path) {
        return next.run(req).await;
    }

    let session = match jar.get(SESSION_COOKIE) {
        Some(cookie) => {
            let token = cookie.value().to_string();
            state
                .auth
                .verify(&token)
                .await
                .map(|claims| Session { access_token: token, claims })
        }
        None => None,
    };

    match decide(&path, session.is_some()) {
        GuardDecision::Redirect(to) => Redirect::temporary(to).into_response(),
        GuardDecision::Allow => {
            if let Some(session) = session {
                req.extensions_mut().insert(session);
            }
            next.run(req).await
        }
    }
}
