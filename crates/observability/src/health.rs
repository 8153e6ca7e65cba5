//! Health-Check-Endpunkt fuer Rundfunk
//!
//! Endpoint: `/health` (jede Methode)
//! Response: `200 OK` mit dem Body `OK`
//!
//! Der Endpunkt ist zustandslos und haengt nicht vom Relay ab. Er dient
//! Load-Balancern und Container-Plattformen als Liveness-Probe.

use axum::{http::StatusCode, response::IntoResponse, routing::any, Router};

/// Fester Body der Health-Antwort
pub const HEALTH_BODY: &str = "OK";

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router() -> Router {
    Router::new().route("/health", any(health_handler))
}

/// `/health` – gibt immer den Erfolgsstatus zurueck
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, HEALTH_BODY)
}
