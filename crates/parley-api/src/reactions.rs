use axum::{
    Extension,
    extract::{Path, State, rejection::PathRejection},
    response::Redirect,
};
use axum_extra::extract::{Form, FormRejection};
use tracing::debug;

use parley_types::api::ReactForm;
use parley_types::models::MessageId;

use crate::auth::AppState;
use crate::error::{OrRedirect, Rejection, blocking};
use crate::middleware::CurrentUser;

/// POST /react/{message_id}: toggles the caller's reaction and returns to
/// the room the message belongs to.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    message_id: Result<Path<MessageId>, PathRejection>,
    Extension(user): Extension<CurrentUser>,
    req: Result<Form<ReactForm>, FormRejection>,
) -> Result<Redirect, Rejection> {
    let Path(message_id) = message_id.or_redirect("/group")?;
    let Form(req) = req.or_redirect("/group")?;
    let (outcome, room_id) =
        blocking(move || Ok(state.db.react(message_id, user.id, &req.emoji_name)?))
            .await
            .or_redirect("/group")?;

    debug!("Reaction on message {}: {:?}", message_id, outcome);
    Ok(Redirect::to(&format!("/chat/{}", room_id)))
}
