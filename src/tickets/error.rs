use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("invalid priority: {0}")]
    InvalidPriority(String),
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("ticket not found: {0}")]
    TicketNotFound(String),
    #[error("ticket {0} is already resolved or closed")]
    AlreadyTerminal(String),
    #[error("storage error: {0}")]
    Storage(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl TicketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TicketError::InvalidPriority(_) | TicketError::InvalidStatus(_) => {
                StatusCode::BAD_REQUEST
            }
            TicketError::TicketNotFound(_) => StatusCode::NOT_FOUND,
            TicketError::AlreadyTerminal(_) => StatusCode::CONFLICT,
            TicketError::Storage(_) | TicketError::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TicketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage details stay in the server log, not the client response.
        let message = match &self {
            TicketError::Storage(e) => {
                log::error!("storage error: {e}");
                "internal storage error".to_string()
            }
            TicketError::Pool(e) => {
                log::error!("connection pool error: {e}");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            TicketError::InvalidPriority("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TicketError::InvalidStatus("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TicketError::TicketNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TicketError::AlreadyTerminal("x".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn storage_errors_map_to_500() {
        assert_eq!(
            TicketError::Storage(diesel::result::Error::NotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
