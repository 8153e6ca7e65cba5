//! Structured Logging Setup via tracing-subscriber
//!
//! Die Umgebung hat Vorrang vor der Konfigurationsdatei:
//! - `RF_LOG_LEVEL`: Filter-Direktive (z.B. `info` oder `rundfunk_relay=debug`)
//! - `RF_LOG_FORMAT`: `text` oder `json`

use anyhow::anyhow;
use tracing_subscriber::{fmt, EnvFilter};

/// Ausgabeformat der Logzeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Menschenlesbare Zeilen
    Text,
    /// Eine JSON-Zeile pro Ereignis
    Json,
}

impl LogFormat {
    /// Liest `text` / `json`, alles andere ist `None`
    pub fn parsen(wert: &str) -> Option<Self> {
        match wert {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Waehlt die Filter-Direktive: Umgebung, dann Konfiguration, dann `info`
fn filter_bauen(umgebung: Option<&str>, level: &str) -> EnvFilter {
    umgebung
        .and_then(|direktive| EnvFilter::try_new(direktive).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Waehlt das Format: Umgebung, dann Konfiguration, dann `text`
fn format_waehlen(umgebung: Option<&str>, format: &str) -> LogFormat {
    umgebung
        .and_then(LogFormat::parsen)
        .or_else(|| LogFormat::parsen(format))
        .unwrap_or(LogFormat::Text)
}

/// Installiert den globalen Subscriber.
///
/// Schlaegt fehl, wenn bereits ein Subscriber installiert ist.
pub fn logging_initialisieren(level: &str, format: &str) -> anyhow::Result<()> {
    let level_env = std::env::var("RF_LOG_LEVEL").ok();
    let format_env = std::env::var("RF_LOG_FORMAT").ok();
    let filter = filter_bauen(level_env.as_deref(), level);

    let ergebnis = match format_waehlen(format_env.as_deref(), format) {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow!("Logging konnte nicht initialisiert werden: {e}"))
}
