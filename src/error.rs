use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures reported to callers. Every variant maps to a stable snake_case
/// code in the response body; storage failures are logged and surfaced as a
/// generic `unavailable`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Self-referential or otherwise malformed user pair.
    #[error("invalid_pair")]
    InvalidPair,

    /// Message body is empty after trimming.
    #[error("empty_message")]
    EmptyMessage,

    /// Unknown user, match or message.
    #[error("{0}_not_found")]
    NotFound(&'static str),

    /// Actor is not one of the match's two participants.
    #[error("not_participant")]
    NotParticipant,

    /// Actor is not the message's recipient.
    #[error("not_recipient")]
    NotRecipient,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("unavailable")]
    Storage(#[from] rusqlite::Error),

    #[error("unavailable")]
    Pool(#[from] r2d2::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidPair | Error::EmptyMessage => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotParticipant | Error::NotRecipient => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Storage(e) => {
                tracing::error!("storage error: {e:?}");
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::Pool(e) => {
                tracing::error!("pool error: {e:?}");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::InvalidPair.to_string(), "invalid_pair");
        assert_eq!(Error::NotFound("match").to_string(), "match_not_found");
        assert_eq!(Error::Conflict("duplicate_user").to_string(), "duplicate_user");
    }
}
