pub mod auth;
pub mod chat;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod reactions;
pub mod rooms;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
