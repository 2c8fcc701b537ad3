use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse},
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::require_session;
use crate::{chat, pages, reactions, rooms};

/// Every page and form endpoint. Transport layers (tracing, static files)
/// are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(auth::home))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/health", get(health));

    // route_layer: unmatched paths still fall through to the 404 page.
    let protected_routes = Router::new()
        .route("/members", get(auth::members))
        .route("/group", get(rooms::list_groups))
        .route("/addGroup", get(rooms::add_group_form).post(rooms::add_group))
        .route("/chat/{room_id}", get(chat::show_chat))
        .route("/inviteUsers/{room_id}", post(rooms::invite_users))
        .route("/sendMessage/{room_id}", post(chat::send_message))
        .route("/react/{message_id}", post(reactions::toggle_reaction))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(pages::not_found()))
}
