use axum::{
    Extension,
    extract::{Path, Query, State, rejection::PathRejection},
    response::{Html, Redirect},
};
use axum_extra::extract::{Form, FormRejection};

use parley_types::api::{ErrorQuery, SendMessageForm};
use parley_types::models::RoomId;

use crate::auth::AppState;
use crate::error::{AppError, OrRedirect, Rejection, blocking};
use crate::middleware::CurrentUser;
use crate::pages;

/// GET /chat/{room_id}: renders the room and marks it read for the caller.
pub async fn show_chat(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    room_id: Result<Path<RoomId>, PathRejection>,
    Query(query): Query<ErrorQuery>,
) -> Result<Html<String>, Rejection> {
    let Path(room_id) = room_id.or_redirect("/group")?;
    let view = blocking(move || Ok(state.db.build_chat_view(room_id, user.id)?))
        .await
        .or_redirect("/group")?;

    Ok(Html(pages::chat(&view, query.error.as_deref())))
}

/// POST /sendMessage/{room_id}
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    room_id: Result<Path<RoomId>, PathRejection>,
    form: Result<Form<SendMessageForm>, FormRejection>,
) -> Result<Redirect, Rejection> {
    let Path(room_id) = room_id.or_redirect("/group")?;
    let back = format!("/chat/{}", room_id);
    let Form(form) = form.or_redirect(back.as_str())?;
    let Some(text) = form.text else {
        return Err(AppError::Validation("Message text is required".into()).redirect_to(back));
    };

    blocking(move || {
        Ok(state
            .db
            .post_message(room_id, user.id, &text, chrono::Utc::now())?)
    })
    .await
    .or_redirect(back.as_str())?;

    Ok(Redirect::to(&back))
}
