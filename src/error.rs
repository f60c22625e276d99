//! Unified application error model and mapping helpers.
//! This module provides the common error enum used by the HTTP surface,
//! along with the mapping from error kind to HTTP status.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Malformed or missing request input.
    UserInput { code: String, message: String },
    /// Credentials presented and rejected (unknown user or wrong password).
    Auth { code: String, message: String },
    /// No active session attached to the request.
    NotAuthenticated { code: String, message: String },
    /// The credential store could not be reached or read.
    StoreUnavailable { code: String, message: String },
    /// Session destruction failed for an infrastructure reason.
    Session { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Auth { code, .. }
            | AppError::NotAuthenticated { code, .. }
            | AppError::StoreUnavailable { code, .. }
            | AppError::Session { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Auth { message, .. }
            | AppError::NotAuthenticated { message, .. }
            | AppError::StoreUnavailable { message, .. }
            | AppError::Session { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn not_authenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotAuthenticated { code: code.into(), message: msg.into() } }
    pub fn store_unavailable<S: Into<String>>(code: S, msg: S) -> Self { AppError::StoreUnavailable { code: code.into(), message: msg.into() } }
    pub fn session<S: Into<String>>(code: S, msg: S) -> Self { AppError::Session { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code. Infrastructure faults collapse to a generic
    /// 500 so the response alone never reveals what failed server-side.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::NotAuthenticated { .. } => 401,
            AppError::StoreUnavailable { .. } => 500,
            AppError::Session { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::auth("invalid_credentials", "no").http_status(), 401);
        assert_eq!(AppError::not_authenticated("no_session", "login first").http_status(), 401);
        assert_eq!(AppError::store_unavailable("store_unavailable", "down").http_status(), 500);
        assert_eq!(AppError::session("session_destroy", "stuck").http_status(), 500);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn display_carries_code_and_message() {
        let e = AppError::auth("invalid_credentials", "Invalid username or password");
        assert_eq!(e.to_string(), "invalid_credentials: Invalid username or password");
    }
}
