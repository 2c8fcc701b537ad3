use axum::{
    Extension,
    extract::{Path, Query, State, rejection::PathRejection},
    response::{Html, Redirect},
};
use axum_extra::extract::{Form, FormRejection};

use parley_types::api::{AddGroupForm, ErrorQuery, InviteForm};
use parley_types::models::RoomId;

use crate::auth::AppState;
use crate::error::{AppError, OrRedirect, Rejection, blocking};
use crate::middleware::CurrentUser;
use crate::pages;

/// GET /group: the caller's rooms with unread counts and previews.
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ErrorQuery>,
) -> Result<Html<String>, Rejection> {
    let rooms = blocking(move || Ok(state.db.list_rooms_for_user(user.id)?))
        .await
        .or_redirect("/members")?;

    Ok(Html(pages::groups(&rooms, query.error.as_deref())))
}

pub async fn add_group_form(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ErrorQuery>,
) -> Result<Html<String>, Rejection> {
    let users = blocking(move || Ok(state.db.list_other_users(user.id)?))
        .await
        .or_redirect("/group")?;

    Ok(Html(pages::add_group(&users, query.error.as_deref())))
}

/// POST /addGroup: the creator always joins the new room.
pub async fn add_group(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    form: Result<Form<AddGroupForm>, FormRejection>,
) -> Result<Redirect, Rejection> {
    let Form(form) = form.or_redirect("/addGroup")?;
    blocking(move || Ok(state.db.create_room(&form.group_name, user.id, &form.users)?))
        .await
        .or_redirect("/addGroup")?;

    Ok(Redirect::to("/group"))
}

/// POST /inviteUsers/{room_id}: users already in the room are skipped.
pub async fn invite_users(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    room_id: Result<Path<RoomId>, PathRejection>,
    form: Result<Form<InviteForm>, FormRejection>,
) -> Result<Redirect, Rejection> {
    let Path(room_id) = room_id.or_redirect("/group")?;
    let back = format!("/chat/{}", room_id);
    let Form(form) = form.or_redirect(back.as_str())?;
    if form.users.is_empty() {
        return Err(
            AppError::Validation("Please select at least one user".into()).redirect_to(back)
        );
    }

    blocking(move || Ok(state.db.invite_users(room_id, &form.users)?))
        .await
        .or_redirect(back.as_str())?;

    Ok(Redirect::to(&back))
}
