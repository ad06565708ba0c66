//! Chat client orchestration — owns the shared session state, the
//! backend handle, and the single live stream task.
//!
//! All failures are recovered here and converted into the session's
//! error field; nothing propagates past this layer. Retry is always a
//! manual, full session restart by the user.

use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use perspective_session::{NextAction, ServerEvent, SessionController, SessionSnapshot};

use crate::backend::{BackendError, ChatBackend, HttpBackend};
use crate::config::ClientConfig;
use crate::stream::{StreamConnector, WsConnector};

/// Session state shared between user commands and the stream task.
pub type SharedController = Arc<RwLock<SessionController>>;

/// Front-end facade over one advisory conversation at a time.
pub struct ChatClient {
    config: ClientConfig,
    backend: Arc<dyn ChatBackend>,
    connector: Arc<dyn StreamConnector>,
    state: SharedController,
    /// At most one live stream task; replaced (and aborted) on restart.
    stream_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatClient {
    /// Build a client over the HTTP backend and WebSocket stream.
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        let backend = Arc::new(HttpBackend::new(config.clone())?);
        Ok(Self::with_parts(config, backend, Arc::new(WsConnector)))
    }

    /// Build from explicit collaborators. Used by tests.
    pub fn with_parts(
        config: ClientConfig,
        backend: Arc<dyn ChatBackend>,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        Self {
            config,
            backend,
            connector,
            state: Arc::new(RwLock::new(SessionController::new())),
            stream_task: Mutex::new(None),
        }
    }

    /// Start a fresh session from the user's input.
    ///
    /// Always allowed — abandons any prior session. Empty input (after
    /// trimming) is silently refused. Failures land in the session's
    /// error field; the returned epoch identifies the new generation.
    pub async fn start_session(&self, text: &str) -> u64 {
        let text = text.trim();
        let epoch;
        {
            let mut controller = self.state.write().await;
            if text.is_empty() {
                debug!("refusing to start session with empty input");
                return controller.epoch();
            }
            epoch = controller.begin_session();
        }
        self.abort_stream();

        match self.backend.init(text).await {
            Ok(response) => {
                {
                    let mut controller = self.state.write().await;
                    if controller.epoch() != epoch {
                        debug!("init response for superseded session");
                        return epoch;
                    }
                    controller.adopt(&response.session_id, &response.status);
                }
                self.open_stream(&response.session_id, epoch);
            }
            Err(e) => {
                let mut controller = self.state.write().await;
                if controller.epoch() == epoch {
                    controller.record_error(format!("Failed to initialize session: {}", e));
                }
            }
        }
        epoch
    }

    /// Submit clarification answers for the active session.
    ///
    /// No local phase change — the transition arrives later as a stream
    /// event. On failure only the error field is set.
    pub async fn submit_clarification(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            debug!("refusing to submit empty clarification");
            return;
        }
        let (session_id, epoch) = {
            let controller = self.state.read().await;
            match controller.session_id() {
                Some(id) => (id.to_string(), controller.epoch()),
                None => {
                    debug!("no active session for clarification");
                    return;
                }
            }
        };

        match self.backend.clarify(&session_id, text).await {
            Ok(()) => {
                let mut controller = self.state.write().await;
                if controller.epoch() == epoch {
                    controller.mark_clarification_submitted();
                }
            }
            Err(e) => {
                let mut controller = self.state.write().await;
                if controller.epoch() == epoch {
                    controller.record_error(format!("Failed to submit clarification: {}", e));
                }
            }
        }
    }

    /// Fold one stream event for the given epoch.
    pub async fn apply_event(&self, epoch: u64, event: ServerEvent) {
        dispatch_event(&self.state, &self.backend, epoch, event).await;
    }

    /// Read-only copy of the current session state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.read().await.snapshot()
    }

    /// The current session generation.
    pub async fn current_epoch(&self) -> u64 {
        self.state.read().await.epoch()
    }

    fn open_stream(&self, session_id: &str, epoch: u64) {
        let url = self.config.stream_url(session_id);
        let connector = Arc::clone(&self.connector);
        let state = Arc::clone(&self.state);
        let backend = Arc::clone(&self.backend);
        let handle = tokio::spawn(async move {
            connector.run(url, epoch, state, backend).await;
        });
        if let Ok(mut slot) = self.stream_task.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Close the previous connection before a new session opens its own.
    fn abort_stream(&self) {
        if let Ok(mut slot) = self.stream_task.lock() {
            if let Some(previous) = slot.take() {
                previous.abort();
            }
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.abort_stream();
    }
}

/// Fold an event into the shared state and run any effect it demands.
///
/// The fold itself is epoch-guarded by the controller; the history
/// refetch triggered by completion re-checks the epoch before the
/// wholesale message replace, so a slow fetch for a superseded session
/// cannot clobber the fresh one.
pub(crate) async fn dispatch_event(
    state: &SharedController,
    backend: &Arc<dyn ChatBackend>,
    epoch: u64,
    event: ServerEvent,
) {
    let action = {
        let mut controller = state.write().await;
        controller.apply_if_current(epoch, event)
    };

    if action != Some(NextAction::RefetchHistory) {
        return;
    }

    let session_id = {
        let controller = state.read().await;
        controller.session_id().map(str::to_string)
    };
    let Some(session_id) = session_id else {
        return;
    };

    match backend.history(&session_id).await {
        Ok(turns) => {
            let mut controller = state.write().await;
            if controller.epoch() == epoch {
                controller.replace_history(turns);
            } else {
                debug!("discarding history for superseded session");
            }
        }
        // Reconciliation is best-effort: the streamed log stands.
        Err(e) => warn!(session_id = %session_id, error = %e, "history refetch failed"),
    }
}
