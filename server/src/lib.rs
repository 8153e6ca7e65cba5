//! rundfunk-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Metriken und Relay und stellt den
//! oeffentlichen Einstiegspunkt fuer den Binary bereit.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use rundfunk_observability::RelayMetriken;
use rundfunk_relay::{RelayServer, RelayState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet das Relay und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und Relay-Zustand anlegen
    /// 2. Listener binden (Fehler hier beendet den Prozess)
    /// 3. Statistik-Task starten
    /// 4. Auf Ctrl-C / SIGTERM warten, dann Verbindungen abbauen
    pub async fn starten(self) -> Result<()> {
        let metriken = RelayMetriken::neu().context("Metriken konnten nicht angelegt werden")?;
        let state = RelayState::neu(self.config.relay_config(), metriken);

        let bind_addr = self.config.bind_adresse()?;
        let server = RelayServer::binden(Arc::clone(&state), bind_addr)
            .await
            .with_context(|| format!("Port {} konnte nicht gebunden werden", bind_addr.port()))?;
        let adresse = server.lokale_adresse()?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            health = %format!("http://localhost:{}/health", adresse.port()),
            metriken = self.config.observability.metriken,
            "Server startet"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_task = tokio::spawn(server.starten(shutdown_rx.clone()));
        let statistik_task = tokio::spawn(statistik_schleife(
            Arc::clone(&state),
            self.config.statistik_intervall(),
            shutdown_rx,
        ));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C / SIGTERM)...");
        shutdown_signal().await;
        tracing::info!(
            verbundene = state.verbundene(),
            "Shutdown-Signal empfangen, Verbindungen werden geschlossen"
        );

        // Empfaenger leben in den Tasks; ein Sendefehler heisst nur, dass alle schon weg sind
        let _ = shutdown_tx.send(true);

        match server_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(fehler = %e, "Relay mit Fehler beendet"),
            Err(e) => tracing::error!(fehler = %e, "Relay-Task abgebrochen"),
        }

        if !register_leeren(&state, self.config.shutdown_wartezeit()).await {
            tracing::warn!(
                verbleibend = state.verbundene(),
                "Nicht alle Verbindungen rechtzeitig abgebaut"
            );
        }
        let _ = statistik_task.await;

        tracing::info!(uptime_sek = state.uptime_sek(), "Server beendet");
        Ok(())
    }
}

/// Loggt periodisch die Anzahl verbundener Clients
async fn statistik_schleife(
    state: Arc<RelayState>,
    intervall: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + intervall, intervall);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let anzahl = state.verbundene();
                state.metriken.verbundene_setzen(anzahl);
                tracing::info!(verbundene = anzahl, "Statistik");
            }
            res = shutdown_rx.changed() => {
                if res.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}

/// Wartet bis das Register leer ist, hoechstens `wartezeit`
async fn register_leeren(state: &RelayState, wartezeit: Duration) -> bool {
    let leer = async {
        while state.verbundene() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    tokio::time::timeout(wartezeit, leer).await.is_ok()
}

/// Wartet auf Ctrl-C oder (unter Unix) SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht installiert werden");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler konnte nicht installiert werden");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rundfunk_relay::{ClientSender, RelayConfig};

    fn test_state() -> Arc<RelayState> {
        RelayState::neu(RelayConfig::default(), RelayMetriken::neu().unwrap())
    }

    #[tokio::test]
    async fn leeres_register_ist_sofort_fertig() {
        let state = test_state();
        assert!(register_leeren(&state, Duration::from_millis(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn register_leeren_gibt_nach_wartezeit_auf() {
        let state = test_state();
        let (sender, _rx) = ClientSender::kanal(4);
        state.registry.registrieren(sender, "test", |_| None);

        assert!(!register_leeren(&state, Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn statistik_setzt_gauge_und_endet_bei_shutdown() {
        let state = test_state();
        let (sender, _rx) = ClientSender::kanal(4);
        state.registry.registrieren(sender, "test", |_| None);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(statistik_schleife(
            Arc::clone(&state),
            Duration::from_secs(60),
            rx,
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(state.metriken.connected_clients.get(), 1);

        tx.send(true).unwrap();
        task.await.unwrap();
    }
}
