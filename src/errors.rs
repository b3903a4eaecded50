use crate::exercises::ExerciseCode;
use crate::models::FieldName;
use axum::http::StatusCode;

/// Caller mistakes rejected by the tracker before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("no day is currently displayed")]
    NoActiveDay,
    #[error("{exercise} has no set {set}")]
    UnknownGroup { exercise: ExerciseCode, set: u8 },
    #[error("{exercise} has no {} field", field.as_str())]
    FieldNotEditable {
        exercise: ExerciseCode,
        field: FieldName,
    },
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

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::NotSignedIn | TrackerError::NoActiveDay => Self::conflict(err.to_string()),
            TrackerError::UnknownGroup { .. } | TrackerError::FieldNotEditable { .. } => {
                Self::bad_request(err.to_string())
            }
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
