//! Prometheus-kompatible Metriken fuer das Relay
//!
//! Registrierte Metriken:
//! - `rundfunk_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `rundfunk_connections_total` – Counter: Angenommene Verbindungen seit Start
//! - `rundfunk_messages_relayed_total` – Counter: Weitergeleitete Client-Nachrichten
//! - `rundfunk_unstructured_messages_total` – Counter: Nachrichten ohne verwertbares JSON
//! - `rundfunk_broadcast_drops_total` – Counter: Verworfene Zustellungen (Queue voll/geschlossen)
//!
//! Die Registry ist nicht global: jede `RelayMetriken`-Instanz besitzt ihre
//! eigene, damit Tests isoliert zaehlen koennen.

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Rundfunk-Prometheus-Metriken
///
/// Clone teilt die zugrunde liegenden Zaehler.
#[derive(Clone)]
pub struct RelayMetriken {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub connections_total: IntCounter,
    pub messages_relayed_total: IntCounter,
    pub unstructured_messages_total: IntCounter,
    pub broadcast_drops_total: IntCounter,
}

impl RelayMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "rundfunk_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let connections_total = IntCounter::with_opts(Opts::new(
            "rundfunk_connections_total",
            "Gesamtanzahl angenommener Verbindungen",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let messages_relayed_total = IntCounter::with_opts(Opts::new(
            "rundfunk_messages_relayed_total",
            "Gesamtanzahl weitergeleiteter Client-Nachrichten",
        ))?;
        registry.register(Box::new(messages_relayed_total.clone()))?;

        let unstructured_messages_total = IntCounter::with_opts(Opts::new(
            "rundfunk_unstructured_messages_total",
            "Nachrichten, die als Rohtext weitergeleitet wurden",
        ))?;
        registry.register(Box::new(unstructured_messages_total.clone()))?;

        let broadcast_drops_total = IntCounter::with_opts(Opts::new(
            "rundfunk_broadcast_drops_total",
            "Verworfene Zustellungen an einzelne Clients",
        ))?;
        registry.register(Box::new(broadcast_drops_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            connections_total,
            messages_relayed_total,
            unstructured_messages_total,
            broadcast_drops_total,
        })
    }

    /// Setzt die Gauge der verbundenen Clients
    pub fn verbundene_setzen(&self, anzahl: usize) {
        self.connected_clients
            .set(i64::try_from(anzahl).unwrap_or(i64::MAX));
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = RelayMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauge_verbundene_setzen() {
        let metriken = RelayMetriken::neu().unwrap();
        metriken.verbundene_setzen(42);
        assert_eq!(metriken.connected_clients.get(), 42);
        metriken.verbundene_setzen(0);
        assert_eq!(metriken.connected_clients.get(), 0);
    }

    #[test]
    fn instanzen_zaehlen_getrennt() {
        let a = RelayMetriken::neu().unwrap();
        let b = RelayMetriken::neu().unwrap();
        a.messages_relayed_total.inc_by(3);
        assert_eq!(a.messages_relayed_total.get(), 3);
        assert_eq!(b.messages_relayed_total.get(), 0);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = RelayMetriken::neu().unwrap();
        metriken.verbundene_setzen(5);
        metriken.broadcast_drops_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("rundfunk_connected_clients 5"));
        assert!(output.contains("rundfunk_broadcast_drops_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn alle_metriken_in_registry_registriert() {
        let metriken = RelayMetriken::neu().unwrap();
        let families = metriken.registry.gather();
        let namen: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        assert!(namen.contains(&"rundfunk_connected_clients"));
        assert!(namen.contains(&"rundfunk_connections_total"));
        assert!(namen.contains(&"rundfunk_messages_relayed_total"));
        assert!(namen.contains(&"rundfunk_unstructured_messages_total"));
        assert!(namen.contains(&"rundfunk_broadcast_drops_total"));
    }
}
