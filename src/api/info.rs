use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::store::Health;

pub fn routes() -> Vec<Route> {
    routes![banner, health]
}

#[get("/")]
fn banner() -> &'static str {
    "Portfolio API is running"
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    /// Whether the backing store answered a ping.
    pub storage: bool,
}

#[get("/health")]
async fn health(health: &State<Health>) -> Json<HealthStatus> {
    let storage = match health.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check could not reach storage: {e}");
            false
        }
    };
    Json(HealthStatus { ok: true, storage })
}
