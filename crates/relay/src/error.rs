//! Fehlertypen fuer das Relay

use rundfunk_core::ClientId;
use thiserror::Error;

/// Fehlertyp fuer das Relay
///
/// Keiner dieser Fehler verlaesst den Task der betroffenen Verbindung.
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler (Listener, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Send-Queue des Clients ist voll, Nachricht verworfen
    #[error("Send-Queue voll: {0}")]
    QueueVoll(ClientId),

    /// Verbindung wurde getrennt (Queue geschlossen)
    #[error("Verbindung getrennt: {0}")]
    VerbindungGetrennt(ClientId),
}

impl RelayError {
    /// Gibt true zurueck wenn der Fehler nur diesen einen Versand betrifft
    pub fn ist_voruebergehend(&self) -> bool {
        matches!(self, Self::QueueVoll(_))
    }
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;
