//! Caller identity
//!
//! The service sits behind a gateway that authenticates users and forwards
//! the numeric user id in a trusted header (`auth.user_header`). Token
//! verification happens upstream.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::{state::AppState, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingHeader(String),
    InvalidUserId(String),
}

impl AuthError {
    fn diagnostics(&self) -> String {
        match self {
            Self::MissingHeader(header) => format!("Missing '{header}' header"),
            Self::InvalidUserId(value) => format!("Invalid user id '{value}'"),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        Error::Unauthorized(err.diagnostics())
    }
}

impl Principal {
    /// Read the principal from `header`
    pub fn from_parts(parts: &Parts, header: &str) -> Result<Self, AuthError> {
        let value = parts
            .headers
            .get(header)
            .ok_or_else(|| AuthError::MissingHeader(header.to_string()))?;
        let value = value
            .to_str()
            .map_err(|_| {
                AuthError::InvalidUserId(String::from_utf8_lossy(value.as_bytes()).into_owned())
            })?
            .trim();
        let user_id = value
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidUserId(value.to_string()))?;
        Ok(Self { user_id })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Principal::from_parts(parts, &state.config.auth.user_header).map_err(|e| {
            tracing::debug!(error = ?e, "Rejected unauthenticated request");
            Error::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<(&str, &str)>) -> Parts {
        let mut builder = Request::builder().uri("/filter");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_numeric_user_id() {
        let principal = Principal::from_parts(&parts(Some(("x-user-id", " 42 "))), "x-user-id");
        assert_eq!(principal, Ok(Principal { user_id: 42 }));
    }

    #[test]
    fn missing_header_is_rejected() {
        let err = Principal::from_parts(&parts(None), "x-user-id").unwrap_err();
        assert_eq!(err, AuthError::MissingHeader("x-user-id".to_string()));
        assert_eq!(Error::from(err).to_string(), "Unauthorized: Missing 'x-user-id' header");
    }

    #[test]
    fn non_numeric_user_id_is_rejected() {
        let err = Principal::from_parts(&parts(Some(("x-user-id", "alice"))), "x-user-id");
        assert_eq!(err, Err(AuthError::InvalidUserId("alice".to_string())));
    }

    #[test]
    fn header_name_is_configurable() {
        let parts = parts(Some(("x-forwarded-user", "7")));
        assert!(Principal::from_parts(&parts, "x-user-id").is_err());
        assert_eq!(
            Principal::from_parts(&parts, "x-forwarded-user"),
            Ok(Principal { user_id: 7 })
        );
    }
}
