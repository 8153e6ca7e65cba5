//! Event-Broadcaster – Verteilt Ereignisse an alle verbundenen Clients
//!
//! Der Broadcaster serialisiert jedes Ereignis genau einmal und reiht den
//! identischen Text in die Send-Queue jedes offenen Clients ein.
//!
//! ## Zustellung
//! - Best-Effort: kein Retry, keine Zwischenspeicherung
//! - Fehler bei einem Client (Queue voll/geschlossen) werden geloggt und
//!   betreffen keinen anderen Client
//! - FIFO pro Client, keine Reihenfolge ueber Clients hinweg
//! - An alle: `an_alle_senden`
//! - An alle ausser einen: `an_alle_ausser_senden`

use rundfunk_core::{ClientId, ServerEreignis};
use rundfunk_observability::RelayMetriken;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{RelayError, RelayResult};
use crate::registry::ConnectionRegistry;

// ---------------------------------------------------------------------------
// Ausgehende Frames
// ---------------------------------------------------------------------------

/// Auftrag an den Schreib-Task einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ausgehend {
    /// Bereits serialisierter Text-Frame (geteilt zwischen allen Empfaengern)
    Text(Arc<str>),
    /// Keepalive-Ping ohne Payload
    Ping,
    /// Close-Frame senden und Schreib-Task beenden
    Schliessen,
}

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
///
/// Die Queue gilt als geschlossen, sobald der Schreib-Task der Verbindung
/// beendet ist.
#[derive(Clone, Debug)]
pub struct ClientSender {
    tx: mpsc::Sender<Ausgehend>,
}

impl ClientSender {
    /// Umhuellt eine bestehende Queue
    pub fn neu(tx: mpsc::Sender<Ausgehend>) -> Self {
        Self { tx }
    }

    /// Erstellt Sender und Empfaenger einer neuen Queue
    pub fn kanal(groesse: usize) -> (Self, mpsc::Receiver<Ausgehend>) {
        let (tx, rx) = mpsc::channel(groesse.max(1));
        (Self::neu(tx), rx)
    }

    /// Gibt an ob die Verbindung noch Frames annimmt
    pub fn ist_offen(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Reiht einen Frame nicht-blockierend ein
    pub fn einreihen(&self, client_id: ClientId, ausgehend: Ausgehend) -> RelayResult<()> {
        self.tx.try_send(ausgehend).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RelayError::QueueVoll(client_id),
            mpsc::error::TrySendError::Closed(_) => RelayError::VerbindungGetrennt(client_id),
        })
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Clients
///
/// Haelt nur eine Referenz auf das Register; Clone teilt den Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
    metriken: RelayMetriken,
}

impl EventBroadcaster {
    /// Erstellt einen Broadcaster ueber dem gegebenen Register
    pub fn neu(registry: Arc<ConnectionRegistry>, metriken: RelayMetriken) -> Self {
        Self { registry, metriken }
    }

    /// Sendet ein Ereignis an alle offenen Clients ausser `ausgeschlossen`
    ///
    /// Gibt die Anzahl der erfolgreich eingereihten Zustellungen zurueck.
    /// Schlaegt nie fehl.
    pub fn senden(&self, ereignis: &ServerEreignis, ausgeschlossen: Option<ClientId>) -> usize {
        let text: Arc<str> = match ereignis.zu_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::warn!(typ = ereignis.typ(), fehler = %e, "Ereignis nicht serialisierbar");
                return 0;
            }
        };

        let mut empfaenger = 0;
        let mut gesendet = 0;
        self.registry.fuer_jeden(|id, eintrag| {
            if Some(id) == ausgeschlossen || !eintrag.sender.ist_offen() {
                return;
            }
            empfaenger += 1;
            match eintrag.sender.einreihen(id, Ausgehend::Text(Arc::clone(&text))) {
                Ok(()) => gesendet += 1,
                Err(e) => {
                    self.metriken.broadcast_drops_total.inc();
                    if e.ist_voruebergehend() {
                        tracing::warn!(client_id = %id, fehler = %e, "Nachricht verworfen");
                    } else {
                        tracing::debug!(client_id = %id, fehler = %e, "Zustellung uebersprungen");
                    }
                }
            }
        });

        tracing::debug!(
            typ = ereignis.typ(),
            empfaenger,
            gesendet,
            "Broadcast verteilt"
        );
        gesendet
    }

    /// Sendet ein Ereignis an alle verbundenen Clients
    pub fn an_alle_senden(&self, ereignis: &ServerEreignis) -> usize {
        self.senden(ereignis, None)
    }

    /// Sendet ein Ereignis an alle verbundenen Clients ausser einem
    pub fn an_alle_ausser_senden(
        &self,
        ausgeschlossen: ClientId,
        ereignis: &ServerEreignis,
    ) -> usize {
        self.senden(ereignis, Some(ausgeschlossen))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn aufbau() -> (Arc<ConnectionRegistry>, EventBroadcaster, RelayMetriken) {
        let registry = Arc::new(ConnectionRegistry::neu());
        let metriken = RelayMetriken::neu().unwrap();
        let broadcaster = EventBroadcaster::neu(Arc::clone(&registry), metriken.clone());
        (registry, broadcaster, metriken)
    }

    fn verbinden(
        registry: &ConnectionRegistry,
        groesse: usize,
    ) -> (ClientId, mpsc::Receiver<Ausgehend>) {
        let (sender, rx) = ClientSender::kanal(groesse);
        let id = registry.registrieren(sender, "127.0.0.1:0", |_| None).id;
        (id, rx)
    }

    fn text(ausgehend: Ausgehend) -> Arc<str> {
        match ausgehend {
            Ausgehend::Text(t) => t,
            anderes => panic!("Text erwartet, erhalten: {anderes:?}"),
        }
    }

    #[tokio::test]
    async fn an_alle_senden_liefert_identische_bytes() {
        let (registry, broadcaster, _) = aufbau();
        let mut empfaenger: Vec<_> = (0..3).map(|_| verbinden(&registry, 8).1).collect();

        let ereignis = ServerEreignis::nachricht(ClientId(2), "test");
        assert_eq!(broadcaster.an_alle_senden(&ereignis), 3);

        let texte: Vec<Arc<str>> = empfaenger
            .iter_mut()
            .map(|rx| text(rx.try_recv().expect("Nachricht muss vorhanden sein")))
            .collect();
        assert!(texte.windows(2).all(|w| w[0] == w[1]));
        // Einmal serialisiert: alle teilen denselben Puffer
        assert!(texte.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(texte[0].contains(r#""content":"test""#));
    }

    #[tokio::test]
    async fn ausgeschlossener_client_empfaengt_nichts() {
        let (registry, broadcaster, _) = aufbau();
        let (id1, mut rx1) = verbinden(&registry, 8);
        let (_id2, mut rx2) = verbinden(&registry, 8);

        let gesendet = broadcaster.an_alle_ausser_senden(id1, &ServerEreignis::beigetreten(id1, 2));
        assert_eq!(gesendet, 1);

        assert!(rx1.try_recv().is_err(), "Ausloeser darf nichts empfangen");
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn geschlossene_verbindung_wird_uebersprungen() {
        let (registry, broadcaster, _) = aufbau();
        let (_id1, rx1) = verbinden(&registry, 8);
        let (_id2, mut rx2) = verbinden(&registry, 8);
        drop(rx1);

        assert_eq!(broadcaster.an_alle_senden(&ServerEreignis::nachricht(ClientId(9), "x")), 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn volle_queue_blockiert_andere_nicht() {
        let (registry, broadcaster, metriken) = aufbau();
        let (_langsam, mut rx_langsam) = verbinden(&registry, 1);
        let (_schnell, mut rx_schnell) = verbinden(&registry, 8);

        broadcaster.an_alle_senden(&ServerEreignis::nachricht(ClientId(1), "eins"));
        let gesendet = broadcaster.an_alle_senden(&ServerEreignis::nachricht(ClientId(1), "zwei"));

        assert_eq!(gesendet, 1);
        assert_eq!(metriken.broadcast_drops_total.get(), 1);
        assert!(text(rx_langsam.try_recv().unwrap()).contains("eins"));
        assert!(rx_langsam.try_recv().is_err());
        assert!(text(rx_schnell.try_recv().unwrap()).contains("eins"));
        assert!(text(rx_schnell.try_recv().unwrap()).contains("zwei"));
    }

    #[tokio::test]
    async fn reihenfolge_pro_client_bleibt_erhalten() {
        let (registry, broadcaster, _) = aufbau();
        let (_id, mut rx) = verbinden(&registry, 16);

        for i in 0..10 {
            broadcaster.an_alle_senden(&ServerEreignis::nachricht(ClientId(1), i.to_string()));
        }
        for i in 0..10 {
            let t = text(rx.try_recv().unwrap());
            assert!(t.contains(&format!(r#""content":"{i}""#)), "falsche Reihenfolge: {t}");
        }
    }

    #[test]
    fn leeres_register() {
        let (_registry, broadcaster, _) = aufbau();
        assert_eq!(broadcaster.an_alle_senden(&ServerEreignis::gegangen(ClientId(1), 0)), 0);
    }
}
