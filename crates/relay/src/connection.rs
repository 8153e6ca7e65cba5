//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Der Task liest Frames in einer Schleife; ein zweiter Task
//! schreibt die Send-Queue auf den Socket.
//!
//! ## State Machine
//! ```text
//! Akzeptiert -> Registriert -> Aktiv -> Geschlossen
//!                                 |          ^
//!                                 +----------+
//!                    Close vom Client, Transportfehler, Shutdown
//! ```
//!
//! Der Abbau (Keepalive stoppen, austragen, `user_left` senden) haengt an
//! der `Sitzung` und laeuft genau einmal, auch wenn der Task abgebrochen wird.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rundfunk_core::{ClientId, EingehendeNachricht, ServerEreignis};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::broadcast::{Ausgehend, ClientSender};
use crate::keepalive::KeepaliveWaechter;
use crate::server_state::RelayState;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Upgrade abgeschlossen, noch nicht registriert
    Akzeptiert,
    /// Im Register eingetragen, ID vergeben
    Registriert,
    /// Begruesst und angekuendigt, Nachrichten werden weitergeleitet
    Aktiv,
    /// Abgebaut (Endzustand)
    Geschlossen,
}

/// Ausloeser fuer den Abbau einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrennGrund {
    /// Close-Frame oder Stream-Ende vom Client
    VomClient,
    /// Lesefehler auf dem Transport
    Transportfehler(String),
    /// Schreib-Task hat aufgegeben (Socket nicht mehr beschreibbar)
    SchreibenBeendet,
    /// Server wird heruntergefahren
    Shutdown,
    /// Task wurde ohne regulaeren Abbau beendet
    Abgebrochen,
}

// ---------------------------------------------------------------------------
// Sitzung
// ---------------------------------------------------------------------------

/// Registrierung einer Verbindung samt Keepalive
///
/// Wird bei `Registriert` erworben und beim Abbau genau einmal freigegeben.
struct Sitzung {
    state: Arc<RelayState>,
    client_id: ClientId,
    /// Registergroesse direkt nach dem Eintragen
    anzahl_bei_beitritt: usize,
    keepalive: Option<KeepaliveWaechter>,
    beendet: bool,
}

impl Sitzung {
    /// Traegt die Verbindung ein, reiht die Begruessung ein und startet den Keepalive
    ///
    /// Die `welcome`-Nachricht liegt in der Queue, bevor irgendein Broadcast
    /// die neue Verbindung erreichen kann.
    fn eroeffnen(state: Arc<RelayState>, sender: ClientSender, herkunft: String) -> Self {
        let willkommen_text = state.config.willkommen.clone();
        let registrierung = state.registry.registrieren(sender, herkunft.clone(), |id| {
            match ServerEreignis::willkommen(id, willkommen_text).zu_json() {
                Ok(json) => Some(Ausgehend::Text(Arc::from(json))),
                Err(e) => {
                    tracing::warn!(client_id = %id, fehler = %e, "Begruessung nicht serialisierbar");
                    None
                }
            }
        });
        let client_id = registrierung.id;
        let keepalive = KeepaliveWaechter::starten(
            Arc::clone(&state.registry),
            client_id,
            state.config.keepalive_intervall,
        );

        state.metriken.connections_total.inc();
        state.metriken.verbundene_setzen(registrierung.anzahl);
        tracing::info!(
            client_id = %client_id,
            peer = %herkunft,
            anzahl = registrierung.anzahl,
            "Client verbunden"
        );

        Self {
            state,
            client_id,
            anzahl_bei_beitritt: registrierung.anzahl,
            keepalive: Some(keepalive),
            beendet: false,
        }
    }

    /// Kuendigt den Client bei allen anderen an
    fn ankuendigen(&self) {
        self.state.broadcaster.an_alle_ausser_senden(
            self.client_id,
            &ServerEreignis::beigetreten(self.client_id, self.anzahl_bei_beitritt),
        );
    }

    /// Baut die Verbindung ab
    ///
    /// Nur der erste Aufruf hat Wirkung; gibt an, ob dieser Aufruf den
    /// Abbau ausgefuehrt hat.
    fn beenden(&mut self, grund: &TrennGrund) -> bool {
        if self.beendet {
            return false;
        }
        self.beendet = true;

        if let Some(keepalive) = self.keepalive.take() {
            keepalive.stoppen();
        }

        let Some(eintrag) = self.state.registry.entfernen(self.client_id) else {
            tracing::debug!(client_id = %self.client_id, "Abbau: Client war bereits ausgetragen");
            return false;
        };
        if *grund == TrennGrund::Shutdown {
            let _ = eintrag.sender.einreihen(self.client_id, Ausgehend::Schliessen);
        }
        let verbunden_sek = (Utc::now() - eintrag.beigetreten_am).num_seconds();
        drop(eintrag);

        let anzahl = self.state.registry.anzahl();
        self.state.metriken.verbundene_setzen(anzahl);
        match grund {
            TrennGrund::Transportfehler(fehler) => tracing::warn!(
                client_id = %self.client_id,
                fehler = %fehler,
                anzahl,
                verbunden_sek,
                "Client nach Transportfehler getrennt"
            ),
            _ => tracing::info!(
                client_id = %self.client_id,
                grund = ?grund,
                anzahl,
                verbunden_sek,
                "Client getrennt"
            ),
        }

        self.state
            .broadcaster
            .an_alle_senden(&ServerEreignis::gegangen(self.client_id, anzahl));
        true
    }
}

impl Drop for Sitzung {
    fn drop(&mut self) {
        self.beenden(&TrennGrund::Abgebrochen);
    }
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
    zustand: VerbindungsZustand,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            zustand: VerbindungsZustand::Akzeptiert,
        }
    }

    /// Aktueller Zustand der Verbindung
    pub fn zustand(&self) -> VerbindungsZustand {
        self.zustand
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, der Transport fehlschlaegt oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(mut self, socket: WebSocket, mut shutdown_rx: watch::Receiver<bool>) {
        let (ws_tx, mut ws_rx) = socket.split();
        let (sender, sende_rx) = ClientSender::kanal(self.state.config.send_queue_groesse);

        let mut sitzung = Sitzung::eroeffnen(
            Arc::clone(&self.state),
            sender,
            self.peer_addr.to_string(),
        );
        let client_id = sitzung.client_id;
        self.zustand = VerbindungsZustand::Registriert;

        let mut schreiber = tokio::spawn(schreib_schleife(ws_tx, sende_rx, client_id));

        sitzung.ankuendigen();
        self.zustand = VerbindungsZustand::Aktiv;

        let mut schreiber_beendet = false;
        let grund = if *shutdown_rx.borrow_and_update() {
            TrennGrund::Shutdown
        } else {
            loop {
                tokio::select! {
                    frame = ws_rx.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                self.nachricht_verarbeiten(client_id, &text);
                            }
                            Some(Ok(Message::Binary(daten))) => {
                                self.nachricht_verarbeiten(client_id, &String::from_utf8_lossy(&daten));
                            }
                            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                                tracing::trace!(client_id = %client_id, "Ping/Pong empfangen");
                            }
                            Some(Ok(Message::Close(_))) | None => break TrennGrund::VomClient,
                            Some(Err(e)) => break TrennGrund::Transportfehler(e.to_string()),
                        }
                    }

                    _ = &mut schreiber => {
                        schreiber_beendet = true;
                        break TrennGrund::SchreibenBeendet;
                    }

                    Ok(()) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break TrennGrund::Shutdown;
                        }
                    }
                }
            }
        };

        sitzung.beenden(&grund);
        drop(sitzung);
        self.zustand = VerbindungsZustand::Geschlossen;

        // Schreib-Task endet, sobald alle Sender-Kopien weg sind
        if !schreiber_beendet {
            let nachlauf = self.state.config.schreib_nachlauf;
            if tokio::time::timeout(nachlauf, &mut schreiber).await.is_err() {
                tracing::debug!(client_id = %client_id, "Schreib-Task abgebrochen");
                schreiber.abort();
            }
        }

        tracing::debug!(client_id = %client_id, "Verbindungs-Task beendet");
    }

    /// Leitet einen eingehenden Frame als `message`-Ereignis an alle weiter
    fn nachricht_verarbeiten(&self, client_id: ClientId, roh: &str) {
        tracing::debug!(client_id = %client_id, nachricht = %roh, "Nachricht empfangen");

        let eingang = EingehendeNachricht::parsen(roh);
        if !eingang.ist_strukturiert() {
            self.state.metriken.unstructured_messages_total.inc();
            tracing::trace!(client_id = %client_id, "Kein content-Feld, Rohtext wird weitergeleitet");
        }

        let ereignis = ServerEreignis::nachricht(client_id, eingang.inhalt());
        self.state.metriken.messages_relayed_total.inc();
        self.state.broadcaster.an_alle_senden(&ereignis);
    }
}

/// Schreibt die Send-Queue auf den Socket, bis sie leer und geschlossen ist
async fn schreib_schleife(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut sende_rx: mpsc::Receiver<Ausgehend>,
    client_id: ClientId,
) {
    while let Some(ausgehend) = sende_rx.recv().await {
        let (frame, letzter) = match ausgehend {
            Ausgehend::Text(text) => (Message::Text(text.to_string()), false),
            Ausgehend::Ping => (Message::Ping(Vec::new()), false),
            Ausgehend::Schliessen => (
                Message::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "Server wird heruntergefahren".into(),
                })),
                true,
            ),
        };

        if let Err(e) = ws_tx.send(frame).await {
            tracing::warn!(client_id = %client_id, fehler = %e, "Senden fehlgeschlagen");
            return;
        }
        if letzter {
            return;
        }
    }

    let _ = ws_tx.close().await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
