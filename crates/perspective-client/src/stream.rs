//! Stream ingestor — one persistent connection per session, decoding
//! server frames into events and folding them into the shared state.
//!
//! Failure policy: an undecodable frame is logged and dropped; a
//! connection-level failure surfaces a generic connection error into
//! the session and ends the task. There is no reconnection — the only
//! recovery path is starting a new session.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use perspective_session::ServerEvent;

use crate::backend::ChatBackend;
use crate::client::{dispatch_event, SharedController};

/// Error message surfaced for any transport-level stream failure.
pub const CONNECTION_ERROR: &str = "WebSocket connection error";

/// Opens and drives the streaming connection for one session epoch.
///
/// A seam so the orchestration layer can be exercised without a live
/// socket.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn run(
        &self,
        url: String,
        epoch: u64,
        state: SharedController,
        backend: Arc<dyn ChatBackend>,
    );
}

/// Production connector over `tokio-tungstenite`.
pub struct WsConnector;

#[async_trait]
impl StreamConnector for WsConnector {
    async fn run(
        &self,
        url: String,
        epoch: u64,
        state: SharedController,
        backend: Arc<dyn ChatBackend>,
    ) {
        let (ws, _) = match connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(e) => {
                warn!(url = %url, error = %e, "stream connect failed");
                record_connection_error(&state, epoch).await;
                return;
            }
        };
        info!(url = %url, "stream connected");

        let mut frames = ws;
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    ingest_text_frame(&state, &backend, epoch, &text).await
                }
                Ok(Message::Close(_)) => {
                    debug!("server closed the stream");
                    break;
                }
                // Ping/pong are answered by the library; binary frames
                // are not part of the contract.
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "stream transport failure");
                    record_connection_error(&state, epoch).await;
                    break;
                }
            }
        }
    }
}

/// Decode one text frame and fold it into the session.
///
/// An undecodable frame is logged and dropped; the session is left
/// exactly as it was, and later frames still apply.
pub(crate) async fn ingest_text_frame(
    state: &SharedController,
    backend: &Arc<dyn ChatBackend>,
    epoch: u64,
    text: &str,
) {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => dispatch_event(state, backend, epoch, event).await,
        Err(e) => warn!(error = %e, "dropping undecodable frame"),
    }
}

async fn record_connection_error(state: &SharedController, epoch: u64) {
    let mut controller = state.write().await;
    if controller.epoch() == epoch {
        controller.record_error(CONNECTION_ERROR);
    } else {
        debug!("suppressing connection error from superseded session");
    }
}
