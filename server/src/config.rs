//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariable `PORT` ueberschreibt den Port.

use anyhow::{anyhow, bail, Context};
use rundfunk_observability::LogFormat;
use rundfunk_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Erlaubte Werte fuer `logging.level`
const LOG_LEVEL: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (Keepalive, Queues, Statistik)
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
    /// Text der `welcome`-Nachricht
    pub willkommen: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Rundfunk".into(),
            willkommen: rundfunk_relay::server_state::STANDARD_WILLKOMMEN.into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse (IP)
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Sekunden zwischen zwei Keepalive-Pings
    pub keepalive_sek: u64,
    /// Groesse der Send-Queue pro Client
    pub send_queue_groesse: usize,
    /// Sekunden zwischen zwei Statistik-Logzeilen
    pub statistik_intervall_sek: u64,
    /// Wie lange beim Shutdown auf das Leeren des Registers gewartet wird
    pub shutdown_wartezeit_sek: u64,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            keepalive_sek: 30,
            send_queue_groesse: 64,
            statistik_intervall_sek: 60,
            shutdown_wartezeit_sek: 5,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Bietet `/metrics` auf dem Relay-Port an
    pub metriken: bool,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    ///
    /// `None`, wenn die Datei nicht existiert. Das Melden uebernimmt der
    /// Aufrufer, sobald das Logging steht.
    pub fn laden(pfad: &str) -> anyhow::Result<Option<Self>> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map(Some)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("Konfigurationsdatei '{pfad}' nicht lesbar: {e}")),
        }
    }

    /// Parst und validiert eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(inhalt)?;
        config.validieren()?;
        Ok(config)
    }

    /// Ersetzt den Port durch den Wert der Umgebungsvariable `PORT`
    ///
    /// `None` laesst den Port unveraendert. Ein nicht parsebarer Wert ist ein
    /// Startfehler.
    pub fn port_ueberschreiben(&mut self, wert: Option<&str>) -> anyhow::Result<()> {
        let Some(wert) = wert else {
            return Ok(());
        };
        self.netzwerk.port = wert
            .trim()
            .parse()
            .map_err(|_| anyhow!("Ungueltiger Wert fuer PORT: '{wert}'"))?;
        Ok(())
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if self.relay.keepalive_sek == 0 {
            bail!("relay.keepalive_sek muss groesser als 0 sein");
        }
        if self.relay.statistik_intervall_sek == 0 {
            bail!("relay.statistik_intervall_sek muss groesser als 0 sein");
        }
        if self.relay.send_queue_groesse == 0 {
            bail!("relay.send_queue_groesse muss groesser als 0 sein");
        }
        if !LOG_LEVEL.contains(&self.logging.level.as_str()) {
            bail!("Unbekanntes Log-Level: '{}'", self.logging.level);
        }
        if LogFormat::parsen(&self.logging.format).is_none() {
            bail!("Unbekanntes Log-Format: '{}'", self.logging.format);
        }
        self.bind_adresse()?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .netzwerk
            .bind_adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.netzwerk.bind_adresse))?;
        Ok(SocketAddr::new(ip, self.netzwerk.port))
    }

    /// Abstand der Statistik-Logzeilen
    pub fn statistik_intervall(&self) -> Duration {
        Duration::from_secs(self.relay.statistik_intervall_sek)
    }

    /// Obergrenze fuer das Warten auf leere Register beim Shutdown
    pub fn shutdown_wartezeit(&self) -> Duration {
        Duration::from_secs(self.relay.shutdown_wartezeit_sek)
    }

    /// Laufzeit-Einstellungen fuer das Relay
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            willkommen: self.server.willkommen.clone(),
            keepalive_intervall: Duration::from_secs(self.relay.keepalive_sek),
            send_queue_groesse: self.relay.send_queue_groesse,
            metriken_endpunkt: self.observability.metriken,
            ..RelayConfig::default()
        }
    }
}
