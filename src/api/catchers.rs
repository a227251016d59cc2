use rocket::{http::Status, serde::json::Json, Catcher, Request};

use crate::error::ErrorMessage;

pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, not_found, unprocessable, internal_error, default]
}

#[catch(400)]
fn bad_request() -> Json<ErrorMessage> {
    Json(ErrorMessage::new("Bad request"))
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Json<ErrorMessage> {
    Json(ErrorMessage::new(format!("No route for {} {}", req.method(), req.uri())))
}

#[catch(422)]
fn unprocessable() -> Json<ErrorMessage> {
    Json(ErrorMessage::new("Unprocessable request"))
}

#[catch(500)]
fn internal_error() -> Json<ErrorMessage> {
    Json(ErrorMessage::new("Internal server error"))
}

#[catch(default)]
fn default(status: Status, _req: &Request<'_>) -> (Status, Json<ErrorMessage>) {
    let reason = status.reason().unwrap_or("Unknown error");
    (status, Json(ErrorMessage::new(reason)))
}
