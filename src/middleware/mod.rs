mod auth;
mod error_handler;

pub use auth::{SESSION_COOKIE, session_guard};
pub use error_handler::log_errors;
