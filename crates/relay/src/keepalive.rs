//! Keepalive – Periodischer Ping pro Verbindung
//!
//! Der Ping haelt Verbindungen ueber Proxys und Load-Balancer offen, die
//! untaetige Verbindungen sonst kappen. Er ist kein Ausfall-Detektor: ein
//! fehlendes Pong fuehrt nicht zur Trennung, das erledigt der Transport.
//!
//! Der Timer ist als Waechter modelliert: `KeepaliveWaechter::starten` beim
//! Registrieren, Drop (oder `stoppen`) beim Abbau. Drop laeuft genau einmal,
//! egal ueber welchen Pfad die Verbindung endet.

use rundfunk_core::ClientId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::broadcast::Ausgehend;
use crate::registry::ConnectionRegistry;

/// Standard-Intervall zwischen zwei Pings
pub const STANDARD_INTERVALL: Duration = Duration::from_secs(30);

/// Laufender Keepalive-Timer einer Verbindung
#[derive(Debug)]
pub struct KeepaliveWaechter {
    client_id: ClientId,
    handle: JoinHandle<()>,
}

impl KeepaliveWaechter {
    /// Startet den Timer; der erste Ping folgt nach einem vollen Intervall
    pub fn starten(
        registry: Arc<ConnectionRegistry>,
        client_id: ClientId,
        intervall: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut takt = tokio::time::interval_at(tokio::time::Instant::now() + intervall, intervall);
            takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                takt.tick().await;

                let Some(eintrag) = registry.abrufen(client_id) else {
                    continue;
                };
                if !eintrag.sender.ist_offen() {
                    continue;
                }
                match eintrag.sender.einreihen(client_id, Ausgehend::Ping) {
                    Ok(()) => tracing::trace!(client_id = %client_id, "Ping eingereiht"),
                    Err(e) => tracing::debug!(client_id = %client_id, fehler = %e, "Ping nicht eingereiht"),
                }
            }
        });

        Self { client_id, handle }
    }

    /// Stoppt den Timer
    pub fn stoppen(self) {
        drop(self);
    }

    /// Zugehoerige Client-ID
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }
}

impl Drop for KeepaliveWaechter {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::trace!(client_id = %self.client_id, "Keepalive gestoppt");
    }
}
