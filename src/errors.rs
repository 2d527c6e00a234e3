use crate::models::Record;
use axum::http::StatusCode;
use thiserror::Error;

/// Transport-level failure reported by a key-value backend.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to fetch records under '{prefix}': {reason}")]
    Fetch { prefix: String, reason: String },

    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("failed to delete '{key}': {reason}")]
    Delete { key: String, reason: String },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq)]
#[error("window must be a finite, non-negative number of months, got {0}")]
pub struct InvalidWindow(pub f64);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("no record dated {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The old entry is gone from the store and the replacement could not be written.
    #[error("record {} was removed but could not be recreated: {reason}", .lost.date)]
    Reconciliation { lost: Record, reason: String },
}

impl From<InvalidWindow> for SessionError {
    fn from(err: InvalidWindow) -> Self {
        Self::Validation(err.to_string())
    }
}

impl SessionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unavailable(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: err.to_string(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::unavailable(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(message) => Self::bad_request(message),
            SessionError::NotFound(date) => Self::not_found(format!("no record dated {date}")),
            SessionError::Store(err) => Self::unavailable(err),
            err @ SessionError::Reconciliation { .. } => Self::internal(err),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use chrono::{TimeZone, Utc};

    fn status_of(err: SessionError) -> StatusCode {
        AppError::from(err).status
    }

    #[test]
    fn session_errors_map_to_http_statuses() {
        assert_eq!(status_of(SessionError::validation("empty")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(SessionError::NotFound("record:2026-01-05T08:30:00.000Z".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(SessionError::Store(StoreError::Write {
                key: "record:2026-01-05T08:30:00.000Z".into(),
                reason: "store rejected the write".into(),
            })),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(SessionError::Reconciliation {
                lost: Record::new(110.0, Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap()),
                reason: "store rejected the write".into(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_window_is_a_bad_request() {
        assert_eq!(status_of(InvalidWindow(-1.0).into()), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_errors_answer_service_unavailable() {
        let err = AppError::from(StoreError::Fetch {
            prefix: "record:".into(),
            reason: "store unavailable: offline".into(),
        });
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.message.contains("record:"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn reconciliation_message_names_the_lost_record() {
        let err = AppError::from(SessionError::Reconciliation {
            lost: Record::new(110.0, Utc.with_ymd_and_hms(2026, 1, 5, 8, 30, 0).unwrap()),
            reason: "disk full".into(),
        });
        assert!(err.message.contains("2026-01-05 08:30:00"), "{}", err.message);
        assert!(err.message.contains("disk full"));
    }
}
