//! Gemeinsamer Relay-Zustand
//!
//! Haelt Register, Broadcaster und Metriken als Arc-Referenzen, die sicher
//! zwischen tokio-Tasks geteilt werden koennen. Jede Instanz ist vollstaendig
//! isoliert (eigener ID-Zaehler, eigene Metriken).

use rundfunk_observability::RelayMetriken;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::broadcast::EventBroadcaster;
use crate::keepalive::STANDARD_INTERVALL;
use crate::registry::ConnectionRegistry;

/// Standard-Begruessung in der `welcome`-Nachricht
pub const STANDARD_WILLKOMMEN: &str = "Bienvenue sur le serveur WebSocket";

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Text der `welcome`-Nachricht
    pub willkommen: String,
    /// Abstand zwischen zwei Keepalive-Pings
    pub keepalive_intervall: Duration,
    /// Groesse der Send-Queue pro Client
    pub send_queue_groesse: usize,
    /// Wie lange der Schreib-Task beim Abbau noch ausliefern darf
    pub schreib_nachlauf: Duration,
    /// `/metrics` im Router anbieten
    pub metriken_endpunkt: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            willkommen: STANDARD_WILLKOMMEN.to_string(),
            keepalive_intervall: STANDARD_INTERVALL,
            send_queue_groesse: 64,
            schreib_nachlauf: Duration::from_secs(2),
            metriken_endpunkt: false,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Register aller Verbindungen
    pub registry: Arc<ConnectionRegistry>,
    /// Event-Broadcaster (Nachrichten an Clients senden)
    pub broadcaster: EventBroadcaster,
    /// Prometheus-Metriken
    pub metriken: RelayMetriken,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig, metriken: RelayMetriken) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::neu());
        let broadcaster = EventBroadcaster::neu(Arc::clone(&registry), metriken.clone());
        Arc::new(Self {
            config: Arc::new(config),
            registry,
            broadcaster,
            metriken,
            start_time: Instant::now(),
        })
    }

    /// Anzahl der verbundenen Clients
    pub fn verbundene(&self) -> usize {
        self.registry.anzahl()
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
