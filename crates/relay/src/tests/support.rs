//! Gemeinsame Hilfen: Test-Server starten, Clients verbinden, Frames lesen

use futures_util::StreamExt;
use rundfunk_observability::RelayMetriken;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::{RelayConfig, RelayResult, RelayServer, RelayState};

pub type TestClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Wartezeit fuer einzelne Frames
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub adresse: SocketAddr,
    pub state: Arc<RelayState>,
    pub shutdown_tx: watch::Sender<bool>,
    pub handle: JoinHandle<RelayResult<()>>,
}

impl TestServer {
    pub async fn starten() -> Self {
        Self::mit_config(RelayConfig::default()).await
    }

    pub async fn mit_config(config: RelayConfig) -> Self {
        let state = RelayState::neu(config, RelayMetriken::neu().unwrap());
        let server = RelayServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
            .await
            .expect("Listener konnte nicht gebunden werden");
        let adresse = server.lokale_adresse().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(server.starten(shutdown_rx));

        Self {
            adresse,
            state,
            shutdown_tx,
            handle,
        }
    }

    /// Verbindet einen Client und liest seine Begruessung
    pub async fn verbinden(&self) -> (TestClient, u64) {
        let (mut client, _) = connect_async(format!("ws://{}/", self.adresse))
            .await
            .expect("WebSocket-Handshake fehlgeschlagen");
        let willkommen = naechstes_ereignis(&mut client).await;
        assert_eq!(willkommen["type"], "welcome");
        let id = willkommen["id"].as_u64().expect("id muss eine Zahl sein");
        (client, id)
    }

    /// Wartet bis das Register die erwartete Groesse hat
    pub async fn warten_auf_anzahl(&self, erwartet: usize) {
        tokio::time::timeout(FRAME_TIMEOUT, async {
            while self.state.verbundene() != erwartet {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "Register hat {} statt {erwartet} Eintraege",
                self.state.verbundene()
            )
        });
    }

    /// Schickt eine rohe HTTP/1.1-Anfrage und liefert die komplette Antwort
    pub async fn http_anfrage(&self, methode: &str, pfad: &str) -> String {
        let mut stream = TcpStream::connect(self.adresse).await.unwrap();
        let anfrage =
            format!("{methode} {pfad} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(anfrage.as_bytes()).await.unwrap();

        let mut antwort = String::new();
        tokio::time::timeout(FRAME_TIMEOUT, stream.read_to_string(&mut antwort))
            .await
            .expect("Timeout beim Lesen der HTTP-Antwort")
            .unwrap();
        antwort
    }
}

/// Liest den naechsten Text-Frame als JSON, Ping/Pong wird uebersprungen
pub async fn naechstes_ereignis(client: &mut TestClient) -> Value {
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, client.next())
            .await
            .expect("Timeout beim Warten auf einen Frame")
            .expect("Stream unerwartet beendet")
            .expect("WebSocket-Fehler");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            anderes => panic!("Text-Frame erwartet, erhalten: {anderes:?}"),
        }
    }
}

/// Stellt sicher, dass in kurzer Zeit kein weiterer Text-Frame eintrifft
pub async fn kein_ereignis(client: &mut TestClient) {
    let ergebnis = tokio::time::timeout(Duration::from_millis(200), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                anderes => return anderes,
            }
        }
    })
    .await;
    if let Ok(Some(Ok(frame))) = ergebnis {
        panic!("Kein Frame erwartet, erhalten: {frame:?}");
    }
}
