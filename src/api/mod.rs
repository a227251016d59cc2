use rocket::{
    serde::json::{Error as JsonError, Json},
    Catcher, Route,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod catchers;
pub mod favorites;
mod info;
pub mod messages;
pub mod reviews;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(favorites::routes());
    routes.extend(messages::routes());
    routes.extend(reviews::routes());
    routes.extend(info::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers::catchers()
}

/// A plain confirmation body, e.g. after a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Unwrap a JSON request body, reporting unreadable or malformed bodies as
/// invalid input rather than Rocket's default 422.
pub(crate) fn json_body<T>(body: std::result::Result<Json<T>, JsonError<'_>>) -> Result<T> {
    match body {
        Ok(json) => Ok(json.into_inner()),
        Err(JsonError::Io(e)) => Err(Error::invalid_input(format!("Unreadable body: {e}"))),
        Err(JsonError::Parse(_, e)) => Err(Error::invalid_input(format!("Malformed JSON: {e}"))),
    }
}
