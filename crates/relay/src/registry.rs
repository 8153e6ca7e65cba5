//! Verbindungsregister – Wer ist gerade verbunden?
//!
//! Das Register ist die einzige geteilte, veraenderliche Struktur des Relays.
//! Es besitzt alle `VerbindungsEintrag`e exklusiv; Verbindungs-Tasks halten
//! nur ihre `ClientId` und greifen ueber das Register zu.
//!
//! ## Sperrmodell
//! - Ein `parking_lot::Mutex` schuetzt Map und ID-Zaehler gemeinsam
//! - Jede Operation haelt die Sperre nur fuer sich selbst
//! - Iteration arbeitet auf einem Schnappschuss, Versand erfolgt ohne Sperre

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rundfunk_core::ClientId;
use std::collections::BTreeMap;

use crate::broadcast::{Ausgehend, ClientSender};

// ---------------------------------------------------------------------------
// VerbindungsEintrag
// ---------------------------------------------------------------------------

/// Unveraenderlicher Datensatz einer registrierten Verbindung
#[derive(Debug, Clone)]
pub struct VerbindungsEintrag {
    /// Vergebene Client-ID
    pub id: ClientId,
    /// Remote-Adresse zum Zeitpunkt der Annahme
    pub herkunft: String,
    /// Zeitpunkt der Registrierung
    pub beigetreten_am: DateTime<Utc>,
    /// Handle auf die Send-Queue der Verbindung
    pub sender: ClientSender,
}

/// Ergebnis einer Registrierung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registrierung {
    /// Vergebene Client-ID
    pub id: ClientId,
    /// Registergroesse direkt nach dem Eintragen
    pub anzahl: usize,
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

struct RegistryInner {
    eintraege: BTreeMap<ClientId, VerbindungsEintrag>,
    /// Zuletzt vergebene ID (0 = noch keine)
    letzte_id: u64,
}

/// Register aller verbundenen Clients
///
/// Wird als `Arc<ConnectionRegistry>` an Broadcaster und Verbindungs-Tasks
/// uebergeben. Jede Instanz hat ihren eigenen ID-Zaehler.
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    /// Erstellt ein leeres Register; die erste vergebene ID ist 1
    pub fn neu() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                eintraege: BTreeMap::new(),
                letzte_id: 0,
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre neue ID zurueck
    ///
    /// Schlaegt nie fehl. IDs sind streng monoton und werden nie wiederverwendet.
    /// Der Frame aus `erster_frame` wird noch unter der Sperre eingereiht, also
    /// bevor ein Broadcast die Verbindung sehen kann.
    pub fn registrieren(
        &self,
        sender: ClientSender,
        herkunft: impl Into<String>,
        erster_frame: impl FnOnce(ClientId) -> Option<Ausgehend>,
    ) -> Registrierung {
        let mut inner = self.inner.lock();
        inner.letzte_id += 1;
        let id = ClientId(inner.letzte_id);

        if let Some(frame) = erster_frame(id) {
            if let Err(e) = sender.einreihen(id, frame) {
                tracing::warn!(client_id = %id, fehler = %e, "Erster Frame nicht eingereiht");
            }
        }

        let eintrag = VerbindungsEintrag {
            id,
            herkunft: herkunft.into(),
            beigetreten_am: Utc::now(),
            sender,
        };
        inner.eintraege.insert(id, eintrag);
        let anzahl = inner.eintraege.len();
        drop(inner);

        tracing::debug!(client_id = %id, anzahl, "Client im Register eingetragen");
        Registrierung { id, anzahl }
    }

    /// Entfernt eine Verbindung
    ///
    /// Gibt den entfernten Eintrag zurueck, oder `None` wenn die ID nicht
    /// (mehr) registriert war. Mehrfaches Entfernen ist kein Fehler.
    pub fn entfernen(&self, id: ClientId) -> Option<VerbindungsEintrag> {
        let entfernt = self.inner.lock().eintraege.remove(&id);
        if entfernt.is_none() {
            tracing::trace!(client_id = %id, "Entfernen: Client bereits ausgetragen");
        }
        entfernt
    }

    /// Sucht den Eintrag einer Verbindung
    pub fn abrufen(&self, id: ClientId) -> Option<VerbindungsEintrag> {
        self.inner.lock().eintraege.get(&id).cloned()
    }

    /// Momentaufnahme aller Eintraege, aufsteigend nach ID
    pub fn schnappschuss(&self) -> Vec<VerbindungsEintrag> {
        self.inner.lock().eintraege.values().cloned().collect()
    }

    /// Ruft `f` fuer jeden Eintrag eines Schnappschusses auf
    ///
    /// Die Sperre ist waehrend der Aufrufe bereits freigegeben; `f` darf also
    /// selbst auf das Register zugreifen.
    pub fn fuer_jeden(&self, mut f: impl FnMut(ClientId, &VerbindungsEintrag)) {
        for eintrag in self.schnappschuss() {
            f(eintrag.id, &eintrag);
        }
    }

    /// Anzahl der registrierten Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.lock().eintraege.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
