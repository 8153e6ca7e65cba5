//! rundfunk-core – Gemeinsame Typen, Wire-Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die vom Relay,
//! der Observability und dem Server-Binary gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, RundfunkError};
pub use event::{EingehendeNachricht, ServerEreignis};
pub use types::ClientId;
