//! rundfunk-relay – WebSocket-Relay
//!
//! Dieser Crate implementiert das Herzstueck von Rundfunk: Clients halten
//! eine WebSocket-Verbindung, und jede Nachricht eines Clients wird an alle
//! verbundenen Clients (inklusive Absender) weitergeleitet.
//!
//! ## Architektur
//!
//! ```text
//! HTTP Listener (RelayServer, Axum)
//!     |  /health  -> 200 OK
//!     |  Upgrade  -> ClientConnection
//!     v
//! ClientConnection (pro Verbindung ein Task + Schreib-Task)
//!     |  State Machine: Akzeptiert -> Registriert -> Aktiv -> Geschlossen
//!     |  KeepaliveWaechter (Ping alle 30 s)
//!     v
//! EventBroadcaster  – Ereignis einmal serialisieren, an alle Queues verteilen
//! ConnectionRegistry – ID-Vergabe und Verbindungsliste (einzige geteilte Struktur)
//! ```

pub mod broadcast;
pub mod connection;
pub mod error;
pub mod keepalive;
pub mod listener;
pub mod registry;
pub mod server_state;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use broadcast::{Ausgehend, ClientSender, EventBroadcaster};
pub use connection::{ClientConnection, TrennGrund, VerbindungsZustand};
pub use error::{RelayError, RelayResult};
pub use keepalive::KeepaliveWaechter;
pub use listener::{relay_router, RelayServer};
pub use registry::{ConnectionRegistry, Registrierung, VerbindungsEintrag};
pub use server_state::{RelayConfig, RelayState};
