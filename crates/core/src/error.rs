//! Fehlertypen fuer Rundfunk
//!
//! Zentraler Fehler-Enum fuer alles, was nicht an eine einzelne Verbindung
//! gebunden ist. Das Relay-Crate definiert eigene Fehler und konvertiert
//! via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Rundfunk
pub type Result<T> = std::result::Result<T, RundfunkError>;

/// Alle moeglichen Fehler im Rundfunk-System
#[derive(Debug, Error)]
pub enum RundfunkError {
    // --- Protokoll ---
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),
}
