use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use parley_types::models::UserId;

use crate::auth::{AppState, SESSION_COOKIE};
use crate::error::{AppError, blocking};

/// The logged-in user, resolved once per request from the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
}

/// Resolve the session cookie to a user, or send the browser to `/login`.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    match resolve_user(&state, &jar).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => Redirect::to("/login").into_response(),
        Err(e) => e.redirect_to("/login").into_response(),
    }
}

/// `Ok(None)` when there is no live session. A session naming a user that
/// no longer exists is an error.
pub(crate) async fn resolve_user(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Option<CurrentUser>, AppError> {
    let Some(session_id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };

    let state = state.clone();
    blocking(move || {
        let Some(session) = state.sessions.get(&session_id).map_err(AppError::Session)? else {
            return Ok(None);
        };
        let user = state
            .db
            .get_user_by_username(&session.username)?
            .ok_or_else(|| AppError::NotFound("User".into()))?;
        Ok(Some(CurrentUser {
            id: user.id,
            username: user.username,
        }))
    })
    .await
}
