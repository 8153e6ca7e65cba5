//! Wire-Ereignisse des Relays
//!
//! Alle Nachrichten, die der Server ueber die WebSocket-Verbindung an Clients
//! schickt, sowie die Auswertung eingehender Text-Frames.
//!
//! ## Design
//! - JSON-Serialisierung via serde, Tagged Enum mit `type`-Feld
//! - Zeitstempel als ISO-8601 in UTC mit Millisekunden (`2026-01-01T00:00:00.000Z`)
//! - Eingehende Frames sind beliebiger Text; JSON mit `content`-Feld ist optional

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ClientId;

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Alle Ereignisse, die der Server an Clients sendet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEreignis {
    /// Begruessung direkt nach dem Verbindungsaufbau, enthaelt die eigene ID
    Welcome { id: ClientId, message: String },
    /// Weitergeleitete Nachricht eines Clients
    Message {
        from: ClientId,
        content: String,
        timestamp: String,
    },
    /// Ein neuer Client ist beigetreten
    UserJoined { id: ClientId, count: usize },
    /// Ein Client hat die Verbindung getrennt
    UserLeft { id: ClientId, count: usize },
}

impl ServerEreignis {
    /// Begruessung fuer einen frisch registrierten Client
    pub fn willkommen(id: ClientId, text: impl Into<String>) -> Self {
        Self::Welcome {
            id,
            message: text.into(),
        }
    }

    /// Relay-Nachricht mit dem aktuellen Zeitstempel
    pub fn nachricht(from: ClientId, content: impl Into<String>) -> Self {
        Self::nachricht_mit_zeit(from, content, Utc::now())
    }

    /// Relay-Nachricht mit explizitem Zeitstempel
    pub fn nachricht_mit_zeit(
        from: ClientId,
        content: impl Into<String>,
        zeit: DateTime<Utc>,
    ) -> Self {
        Self::Message {
            from,
            content: content.into(),
            timestamp: zeit.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Beitritts-Ankuendigung mit der neuen Verbindungsanzahl
    pub fn beigetreten(id: ClientId, count: usize) -> Self {
        Self::UserJoined { id, count }
    }

    /// Abgangs-Ankuendigung mit der neuen Verbindungsanzahl
    pub fn gegangen(id: ClientId, count: usize) -> Self {
        Self::UserLeft { id, count }
    }

    /// Kurzname des Ereignisses fuer Logs
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Message { .. } => "message",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
        }
    }

    /// Serialisiert das Ereignis einmalig zu JSON-Text
    pub fn zu_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Ausgewerteter Text-Frame eines Clients
///
/// Regel: ein JSON-Objekt mit "wahrem" `content`-Feld liefert dieses Feld,
/// alles andere (kein JSON, kein Objekt, fehlendes oder leeres `content`)
/// wird unveraendert als Rohtext weitergereicht.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EingehendeNachricht {
    /// `content`-Feld eines JSON-Objekts
    Strukturiert(String),
    /// Der unveraenderte Frame-Text
    Rohtext(String),
}

impl EingehendeNachricht {
    /// Wertet einen eingehenden Frame aus. Schlaegt nie fehl.
    pub fn parsen(roh: &str) -> Self {
        let Ok(Value::Object(objekt)) = serde_json::from_str::<Value>(roh) else {
            return Self::Rohtext(roh.to_string());
        };

        match objekt.get("content") {
            Some(Value::String(text)) if !text.is_empty() => Self::Strukturiert(text.clone()),
            Some(Value::Number(zahl)) if zahl.as_f64().is_some_and(|z| z != 0.0) => {
                Self::Strukturiert(zahl.to_string())
            }
            Some(Value::Bool(true)) => Self::Strukturiert("true".to_string()),
            Some(wert @ (Value::Object(_) | Value::Array(_))) => {
                Self::Strukturiert(wert.to_string())
            }
            _ => Self::Rohtext(roh.to_string()),
        }
    }

    /// Gibt an, ob der Inhalt aus einem `content`-Feld stammt
    pub fn ist_strukturiert(&self) -> bool {
        matches!(self, Self::Strukturiert(_))
    }

    /// Liefert den weiterzuleitenden Inhalt
    pub fn inhalt(self) -> String {
        match self {
            Self::Strukturiert(text) | Self::Rohtext(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn welcome_wire_format() {
        let json = ServerEreignis::willkommen(ClientId(1), "Hallo").zu_json().unwrap();
        let wert: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["type"], "welcome");
        assert_eq!(wert["id"], 1);
        assert_eq!(wert["message"], "Hallo");
    }

    #[test]
    fn message_wire_format_mit_iso_zeitstempel() {
        let zeit = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let json = ServerEreignis::nachricht_mit_zeit(ClientId(2), "test", zeit)
            .zu_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"type":"message","from":2,"content":"test","timestamp":"2026-01-02T03:04:05.000Z"}"#
        );
    }

    #[test]
    fn join_und_leave_wire_format() {
        let joined = ServerEreignis::beigetreten(ClientId(3), 3).zu_json().unwrap();
        assert_eq!(joined, r#"{"type":"user_joined","id":3,"count":3}"#);

        let left = ServerEreignis::gegangen(ClientId(1), 2).zu_json().unwrap();
        assert_eq!(left, r#"{"type":"user_left","id":1,"count":2}"#);
    }

    #[test]
    fn typ_namen_passen_zum_tag() {
        assert_eq!(ServerEreignis::gegangen(ClientId(1), 0).typ(), "user_left");
        assert_eq!(ServerEreignis::nachricht(ClientId(1), "x").typ(), "message");
    }

    #[test]
    fn rohtext_bleibt_unveraendert() {
        let n = EingehendeNachricht::parsen("hello");
        assert!(!n.ist_strukturiert());
        assert_eq!(n.inhalt(), "hello");
    }

    #[test]
    fn content_feld_wird_extrahiert() {
        let n = EingehendeNachricht::parsen(r#"{"content":"hi"}"#);
        assert!(n.ist_strukturiert());
        assert_eq!(n.inhalt(), "hi");
    }

    #[test]
    fn json_ohne_content_wird_rohtext() {
        let roh = r#"{"type":"chat","text":"hi"}"#;
        assert_eq!(
            EingehendeNachricht::parsen(roh),
            EingehendeNachricht::Rohtext(roh.to_string())
        );
    }

    #[test]
    fn leeres_oder_falsches_content_wird_rohtext() {
        for roh in [
            r#"{"content":""}"#,
            r#"{"content":0}"#,
            r#"{"content":false}"#,
            r#"{"content":null}"#,
        ] {
            assert_eq!(EingehendeNachricht::parsen(roh).inhalt(), roh);
        }
    }

    #[test]
    fn nicht_string_content_wird_als_json_text_geliefert() {
        assert_eq!(EingehendeNachricht::parsen(r#"{"content":42}"#).inhalt(), "42");
        assert_eq!(EingehendeNachricht::parsen(r#"{"content":true}"#).inhalt(), "true");
        assert_eq!(
            EingehendeNachricht::parsen(r#"{"content":{"a":1}}"#).inhalt(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn json_ohne_objekt_wird_rohtext() {
        for roh in ["5", "null", r#""text""#, "[1,2]", "{kaputt"] {
            let n = EingehendeNachricht::parsen(roh);
            assert!(!n.ist_strukturiert(), "{roh} darf nicht strukturiert sein");
            assert_eq!(n.inhalt(), roh);
        }
    }
}
