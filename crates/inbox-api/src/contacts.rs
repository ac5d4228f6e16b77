//! Contact panel edits. These only touch the session's workspace; nothing
//! is written to the backend.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
};
use tracing::warn;

use inbox_types::api::{NotesForm, StatusForm, TagForm};
use inbox_types::models::Session;
use inbox_types::profile::ContactStatus;

use crate::auth::AppState;
use crate::inbox::closed;
use crate::middleware::HOME_PATH;

/// The panel belongs to the selected contact, so the inbox page shows it again.
fn back() -> Redirect {
    Redirect::to(HOME_PATH)
}

pub async fn add_tag(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
    Form(form): Form<TagForm>,
) -> Result<Redirect, StatusCode> {
    let workspace = state.workspace(&session).await;
    match workspace.add_tag(&user_id, &form.tag).await.map_err(closed)? {
        Some(_) => Ok(back()),
        None => Err(StatusCode::NOT_FOUND),
    }
}

pub async fn set_status(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect, StatusCode> {
    let status: ContactStatus = form.status.parse().map_err(|e| {
        warn!("{}", e);
        StatusCode::BAD_REQUEST
    })?;

    let workspace = state.workspace(&session).await;
    if !workspace.set_status(&user_id, status).await.map_err(closed)? {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(back())
}

pub async fn set_notes(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
    Form(form): Form<NotesForm>,
) -> Result<Redirect, StatusCode> {
    let workspace = state.workspace(&session).await;
    if !workspace.set_notes(&user_id, &form.notes).await.map_err(closed)? {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(back())
}
