//! # rundfunk-observability
//!
//! Observability-Crate fuer Rundfunk:
//! - Health-Check-Endpunkt (`/health`)
//! - Prometheus-kompatible Relay-Metriken (`/metrics`)
//! - Structured Logging via tracing-subscriber

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::health_router;
pub use logging::{logging_initialisieren, LogFormat};
pub use metrics::{metrics_router, RelayMetriken};
