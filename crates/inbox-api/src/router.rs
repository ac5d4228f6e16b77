//! Axum router construction.

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::auth::{self, AppState};
use crate::contacts;
use crate::inbox;
use crate::middleware::session_guard;

/// Every route sits behind the session guard; the guard itself lets the
/// asset and health paths through.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Auth zone
        .route("/auth/signin", get(auth::sign_in_page).post(auth::sign_in))
        .route("/signout", post(auth::sign_out))
        // Inbox
        .route("/", get(inbox::index))
        .route("/contacts/{user_id}", get(inbox::open_contact))
        .route("/compose", post(inbox::compose))
        .route("/gateway", get(inbox::gateway))
        // Contact panel
        .route("/contacts/{user_id}/tags", post(contacts::add_tag))
        .route("/contacts/{user_id}/status", post(contacts::set_status))
        .route("/contacts/{user_id}/notes", post(contacts::set_notes))
        // Unguarded
        .route("/assets/inbox.js", get(inbox::script))
        .route("/health", get(inbox::health))
        .layer(middleware::from_fn_with_state(state.clone(), session_guard))
        .with_state(state)
}
