use axum::{
    Extension, Form,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect},
};
use tracing::{error, warn};

use inbox_gateway::connection;
use inbox_gateway::workspace::{SubmitOutcome, WorkspaceClosed};
use inbox_types::api::{ComposeForm, InboxQuery};
use inbox_types::models::Session;

use crate::auth::AppState;
use crate::middleware::HOME_PATH;
use crate::views;

pub(crate) fn closed(e: WorkspaceClosed) -> StatusCode {
    error!("{}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// GET /: reloads contacts and renders the inbox.
pub async fn index(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<InboxQuery>,
) -> Result<Html<String>, StatusCode> {
    let workspace = state.workspace(&session).await;
    workspace.refresh().await.map_err(closed)?;

    let filter = query.q.as_deref();
    let view = workspace.snapshot(filter).await.map_err(closed)?;
    Ok(Html(views::inbox_page(&view, filter, session.claims.email.as_deref())))
}

/// GET /contacts/{user_id}: opens a conversation.
pub async fn open_contact(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
    Query(query): Query<InboxQuery>,
) -> Result<Html<String>, StatusCode> {
    let workspace = state.workspace(&session).await;
    workspace.refresh().await.map_err(closed)?;

    if !workspace.select(&user_id).await.map_err(closed)? {
        return Err(StatusCode::NOT_FOUND);
    }

    let filter = query.q.as_deref();
    let view = workspace.snapshot(filter).await.map_err(closed)?;
    Ok(Html(views::inbox_page(&view, filter, session.claims.email.as_deref())))
}

/// POST /compose: sends the composer text to the open conversation. The
/// new row shows up through the subscription, not through this response.
pub async fn compose(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<ComposeForm>,
) -> Result<Redirect, StatusCode> {
    let workspace = state.workspace(&session).await;
    // A failed send keeps the draft, which the next render puts back in the composer.
    if workspace.submit(&form.text).await.map_err(closed)? == SubmitOutcome::Failed {
        warn!("Message to the open conversation was not sent");
    }
    Ok(Redirect::to(HOME_PATH))
}

/// GET /gateway: live thread updates for the session.
pub async fn gateway(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let workspace = state.workspace(&session).await;
    ws.on_upgrade(move |socket| connection::handle_connection(socket, workspace))
}

pub async fn health() -> &'static str {
    "ok"
}

const INBOX_SCRIPT: &str = include_str!("../assets/inbox.js");

pub async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], INBOX_SCRIPT)
}
