//! Identifikationstypen fuer Rundfunk
//!
//! Client-IDs verwenden das Newtype-Pattern, damit sie nicht mit Zaehlern
//! oder Verbindungsanzahlen verwechselt werden koennen.

use serde::{Deserialize, Serialize};

/// Eindeutige Client-ID
///
/// Wird bei der Registrierung vergeben, ist streng monoton steigend und wird
/// innerhalb der Prozesslaufzeit nie wiederverwendet. Auf dem Draht erscheint
/// sie als nackte Ganzzahl (`"id": 3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}
