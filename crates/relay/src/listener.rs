//! HTTP-Listener – Bindet Socket, nimmt WebSocket-Upgrades an
//!
//! Der `RelayServer` bindet einen TCP-Socket und bedient darauf einen
//! Axum-Router:
//! - `/health` – Liveness-Probe (immer `200 OK`)
//! - `/metrics` – Prometheus (nur wenn in der Config aktiviert)
//! - jeder andere Pfad – WebSocket-Upgrade, sonst `404 Not Found`
//!
//! ## Concurrency-Modell
//! Jede angenommene WebSocket-Verbindung laeuft als eigener tokio-Task mit
//! einer `ClientConnection`. Die Tasks teilen nur den `RelayState`.

use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use rundfunk_observability::{health_router, metrics_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::connection::ClientConnection;
use crate::error::RelayResult;
use crate::server_state::RelayState;

/// Body fuer unbekannte Pfade
const NICHT_GEFUNDEN: &str = "Not Found";

/// Zustand der Router-Handler
#[derive(Clone)]
struct RouterZustand {
    state: Arc<RelayState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Baut den vollstaendigen Router des Relays
pub fn relay_router(state: Arc<RelayState>, shutdown_rx: watch::Receiver<bool>) -> Router {
    let metriken_endpunkt = state.config.metriken_endpunkt;
    let metriken = state.metriken.clone();

    let mut router = Router::new()
        .fallback(upgrade_handler)
        .with_state(RouterZustand { state, shutdown_rx })
        .merge(health_router());

    if metriken_endpunkt {
        router = router.merge(metrics_router(metriken));
    }

    router.layer(TraceLayer::new_for_http())
}

/// Nimmt WebSocket-Upgrades auf beliebigen Pfaden an
async fn upgrade_handler(
    ws: Option<WebSocketUpgrade>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(zustand): State<RouterZustand>,
) -> Response {
    let Some(ws) = ws else {
        return (StatusCode::NOT_FOUND, NICHT_GEFUNDEN).into_response();
    };

    tracing::debug!(peer = %peer_addr, "WebSocket-Upgrade angenommen");
    ws.on_upgrade(move |socket| async move {
        ClientConnection::neu(zustand.state, peer_addr)
            .verarbeiten(socket, zustand.shutdown_rx)
            .await;
    })
}

/// WebSocket-Relay-Server
///
/// Trennt Binden und Laufen, damit Aufrufer die tatsaechliche Adresse
/// (z.B. bei Port 0) vor dem Start abfragen koennen.
pub struct RelayServer {
    state: Arc<RelayState>,
    listener: TcpListener,
}

impl RelayServer {
    /// Bindet den Listener an die gegebene Adresse
    pub async fn binden(state: Arc<RelayState>, bind_addr: SocketAddr) -> RelayResult<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Gibt die tatsaechlich gebundene Adresse zurueck
    pub fn lokale_adresse(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Bedient Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    ///
    /// Offene WebSocket-Verbindungen beobachten dasselbe Signal und bauen
    /// sich selbst ab.
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, "WebSocket-Relay gestartet");

        let app = relay_router(Arc::clone(&self.state), shutdown_rx.clone());
        let mut signal_rx = shutdown_rx;

        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*signal_rx.borrow_and_update() {
                if signal_rx.changed().await.is_err() {
                    // Sender weg: kein Shutdown mehr moeglich, weiterlaufen
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("Relay: Shutdown-Signal empfangen");
        })
        .await?;

        tracing::info!("WebSocket-Relay gestoppt");
        Ok(())
    }
}
