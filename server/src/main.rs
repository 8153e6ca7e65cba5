//! Rundfunk Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use rundfunk_observability::logging_initialisieren;
use rundfunk_server::{config::ServerConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("RUNDFUNK_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let geladen = ServerConfig::laden(&config_pfad)?;
    let datei_fehlt = geladen.is_none();
    let mut config = geladen.unwrap_or_default();
    config.port_ueberschreiben(std::env::var("PORT").ok().as_deref())?;

    logging_initialisieren(&config.logging.level, &config.logging.format)?;

    if datei_fehlt {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Rundfunk Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
