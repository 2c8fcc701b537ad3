use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::{
    Form, FormRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use tracing::{error, info, warn};

use parley_db::{Database, SessionStore};
use parley_types::api::{CredentialsForm, ErrorQuery};
use parley_types::models::{User, UserId};

use crate::error::{AppError, OrRedirect, Rejection, blocking};
use crate::middleware::{CurrentUser, resolve_user};
use crate::pages;

pub const SESSION_COOKIE: &str = "parley.sid";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionStore,
    pub session_ttl: chrono::Duration,
    pub secure_cookies: bool,
}

/// Trims the name and strips the characters `$` and `.`.
pub fn sanitize_username(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '$' | '.'))
        .collect::<String>()
        .trim()
        .to_string()
}

// -- Credential store --

/// Creates a user with an Argon2id hash of `password`. Blocking.
pub fn register_user(db: &Database, username: &str, password: &str) -> Result<UserId, AppError> {
    let username = sanitize_username(username);
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if password.trim().is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = db.create_user(&username, &password_hash)?;
    info!("Registered user {} ({})", username, user_id);
    Ok(user_id)
}

/// Checks a username/password pair. Blocking.
pub fn authenticate_user(db: &Database, username: &str, password: &str) -> Result<User, AppError> {
    let username = sanitize_username(username);
    let user = db
        .get_user_by_username(&username)?
        .ok_or(AppError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(format!("stored hash for {} is corrupt: {}", username, e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::InvalidCredentials)?;

    Ok(user.into())
}

fn session_cookie(id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

// -- Handlers --

pub async fn home(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ErrorQuery>,
) -> Html<String> {
    // A broken session just shows the logged-out page.
    let user = resolve_user(&state, &jar).await.ok().flatten();
    Html(pages::home(
        user.as_ref().map(|u| u.username.as_str()),
        query.error.as_deref(),
    ))
}

pub async fn signup_form(Query(query): Query<ErrorQuery>) -> Html<String> {
    Html(pages::signup(query.error.as_deref()))
}

pub async fn signup(
    State(state): State<AppState>,
    form: Result<Form<CredentialsForm>, FormRejection>,
) -> Result<Redirect, Rejection> {
    let Form(form) = form.or_redirect("/signup")?;
    blocking(move || register_user(&state.db, &form.username, &form.password).map(|_| ()))
        .await
        .or_redirect("/signup")?;

    Ok(Redirect::to("/login"))
}

pub async fn login_form(Query(query): Query<ErrorQuery>) -> Html<String> {
    Html(pages::login(query.error.as_deref()))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    form: Result<Form<CredentialsForm>, FormRejection>,
) -> Result<(CookieJar, Redirect), Rejection> {
    let Form(form) = form.or_redirect("/login")?;
    if form.username.trim().is_empty() {
        return Err(AppError::Validation("Please provide a username.".into()).redirect_to("/login"));
    }
    if form.password.is_empty() {
        return Err(AppError::Validation("Please provide a password.".into()).redirect_to("/login"));
    }

    let app = state.clone();
    let session = blocking(move || {
        let user = authenticate_user(&app.db, &form.username, &form.password).inspect_err(|e| {
            if matches!(e, AppError::InvalidCredentials) {
                warn!("Failed login for '{}'", sanitize_username(&form.username));
            }
        })?;
        app.sessions
            .create(&user.username, app.session_ttl)
            .map_err(AppError::Session)
    })
    .await
    .or_redirect("/login")?;

    info!("User {} logged in", session.username);
    let jar = jar.add(session_cookie(session.id, state.secure_cookies));
    Ok((jar, Redirect::to("/")))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), Rejection> {
    if let Some(id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        blocking(move || state.sessions.destroy(&id).map_err(AppError::Session))
            .await
            .map_err(|e| {
                error!("Logout failed: {}", e);
                AppError::Validation("Logout failed".into()).redirect_to("/")
            })?;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/")))
}

pub async fn members(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Html(pages::members(&user.username))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("parley.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn sanitizing_strips_and_trims() {
        assert_eq!(sanitize_username("  bob  "), "bob");
        assert_eq!(sanitize_username("$bo.b"), "bob");
        assert_eq!(sanitize_username(" . $ "), "");
    }

    #[test]
    fn register_then_authenticate() {
        let (_dir, db) = open_db();
        let id = register_user(&db, " alice ", "correct horse").unwrap();

        let user = authenticate_user(&db, "alice", "correct horse").unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");

        let stored = db.get_user_by_username("alice").unwrap().unwrap();
        assert_ne!(stored.password_hash, "correct horse");
        assert!(stored.password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn duplicate_and_bad_credentials() {
        let (_dir, db) = open_db();
        register_user(&db, "alice", "pw").unwrap();

        assert!(matches!(
            register_user(&db, "alice.", "other"),
            Err(AppError::DuplicateUsername)
        ));
        assert!(matches!(
            authenticate_user(&db, "alice", "wrong"),
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate_user(&db, "nobody", "pw"),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn blank_fields_are_validation_errors() {
        let (_dir, db) = open_db();
        assert!(matches!(register_user(&db, " $ ", "pw"), Err(AppError::Validation(_))));
        assert!(matches!(register_user(&db, "bob", "   "), Err(AppError::Validation(_))));
    }
}
