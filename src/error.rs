use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidInput(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::StorageUnavailable(_) | Self::Internal(_) => Status::InternalServerError,
        }
    }

    /// The message shown to the client. Server-side detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(_) | Self::NotFound(_) => self.to_string(),
            Self::StorageUnavailable(_) => "Storage unavailable".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        (status, Json(ErrorMessage::new(self.public_message()))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(Error::invalid_input("x").status(), Status::BadRequest);
        assert_eq!(Error::not_found("x").status(), Status::NotFound);
        assert_eq!(
            Error::StorageUnavailable("timed out".into()).status(),
            Status::InternalServerError
        );
        assert_eq!(
            Error::Internal("no counter".into()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn storage_detail_is_not_exposed() {
        let err = Error::StorageUnavailable("connection refused at 10.0.0.3".into());
        assert_eq!(err.public_message(), "Storage unavailable");

        let err = Error::invalid_input("placeId is required");
        assert_eq!(err.public_message(), "Invalid input: placeId is required");
    }
}
