//! Session controller — folds server events into one session's state.
//!
//! Pure state machine: no IO lives here. Network effects the fold needs
//! (the history refetch on completion) are reported back to the caller
//! as a [`NextAction`] and executed by the client layer.
//!
//! Every asynchronous completion in the client layer carries the epoch
//! it was born under; [`SessionController::apply_if_current`] drops
//! anything from a superseded session, so a stale frame queued by an
//! old connection can never touch the fresh session's state.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, warn};

use crate::event::{AgentTag, ChatMessage, HistoryTurn, MessageKind, ServerEvent};
use crate::progress::{round_from_stage, Progress};
use crate::state::SessionPhase;

/// Effect the caller must run after a fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Nothing to do.
    None,
    /// Fetch the durable session record and replace the message log.
    RefetchHistory,
}

/// The two agent slots of one debate round.
///
/// A later event for the same round and agent overwrites its slot; a
/// round entry is never removed once created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutputs {
    /// Expansion agent's output (first slot).
    pub expansion: Option<String>,
    /// Compression agent's output (second slot).
    pub compression: Option<String>,
}

/// Read-only copy of a session's state for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub phase: SessionPhase,
    pub error: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub rounds: BTreeMap<u32, RoundOutputs>,
    pub current_round: u32,
    pub progress: Progress,
    pub clarification_submitted: bool,
}

/// Owns one session's identity, lifecycle state, message log, round
/// transcript, and derived progress.
#[derive(Debug)]
pub struct SessionController {
    epoch: u64,
    session_id: Option<String>,
    phase: SessionPhase,
    error: Option<String>,
    messages: Vec<ChatMessage>,
    rounds: BTreeMap<u32, RoundOutputs>,
    current_round: u32,
    progress: Progress,
    clarification_submitted: bool,
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            session_id: None,
            phase: SessionPhase::Init,
            error: None,
            messages: Vec::new(),
            rounds: BTreeMap::new(),
            current_round: 0,
            progress: Progress::idle(),
            clarification_submitted: false,
        }
    }

    /// Current session generation. Bumped by every [`Self::begin_session`].
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Reset for a fresh session and return the new epoch.
    ///
    /// Abandons any prior session: clears the log, rounds, error, and
    /// identity, and sets the optimistic pre-init progress estimate.
    pub fn begin_session(&mut self) -> u64 {
        self.epoch += 1;
        self.session_id = None;
        self.phase = SessionPhase::Init;
        self.error = None;
        self.messages.clear();
        self.rounds.clear();
        self.current_round = 0;
        self.progress = Progress::analyzing();
        self.clarification_submitted = false;
        debug!(epoch = self.epoch, "session reset");
        self.epoch
    }

    /// Adopt the init response: session identity plus initial status.
    pub fn adopt(&mut self, session_id: &str, status_token: &str) {
        self.session_id = Some(session_id.to_string());
        match status_token.parse::<SessionPhase>() {
            Ok(phase) => self.phase = phase,
            Err(err) => warn!(%err, "init response carried unrecognized status"),
        }
    }

    /// Record a failure from a synchronous backend call.
    ///
    /// Sets only the error field — a failed init leaves the session
    /// unset so the caller can retry with a fresh start.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Mark the clarification answers as optimistically submitted.
    ///
    /// Cleared automatically when the phase leaves
    /// [`SessionPhase::ClarificationPending`].
    pub fn mark_clarification_submitted(&mut self) {
        self.clarification_submitted = true;
    }

    /// Fold one event if it belongs to the given epoch.
    ///
    /// Returns `None` when the event is stale (from a superseded
    /// session) and was discarded.
    pub fn apply_if_current(&mut self, epoch: u64, event: ServerEvent) -> Option<NextAction> {
        if epoch != self.epoch {
            debug!(
                stale_epoch = epoch,
                current_epoch = self.epoch,
                "dropping event from superseded session"
            );
            return None;
        }
        Some(self.apply(event))
    }

    /// Fold one server event into the session state.
    pub fn apply(&mut self, event: ServerEvent) -> NextAction {
        match event {
            ServerEvent::StateChange { state } => self.apply_state_change(&state),
            ServerEvent::Progress {
                stage,
                progress_percent,
                description,
            } => {
                self.apply_progress(stage, progress_percent, description);
                NextAction::None
            }
            ServerEvent::AgentOutput {
                content,
                agent,
                round,
            } => {
                self.apply_output(MessageKind::AgentOutput, content, agent, round);
                NextAction::None
            }
            ServerEvent::Synthesis {
                content,
                agent,
                round,
            } => {
                self.apply_output(MessageKind::Synthesis, content, agent, round);
                NextAction::None
            }
            ServerEvent::Error { content } => {
                self.error = Some(content.unwrap_or_else(|| "Backend error".to_string()));
                self.phase = SessionPhase::Error;
                NextAction::None
            }
            ServerEvent::Unknown => {
                debug!("ignoring unrecognized event type");
                NextAction::None
            }
        }
    }

    fn apply_state_change(&mut self, token: &str) -> NextAction {
        let phase = match token.parse::<SessionPhase>() {
            Ok(phase) => phase,
            Err(err) => {
                warn!(%err, "ignoring state_change with unrecognized token");
                return NextAction::None;
            }
        };

        // ERROR is sticky: a failed session only recovers via a fresh start.
        if self.phase == SessionPhase::Error {
            debug!(%phase, "dropping state_change after terminal error");
            return NextAction::None;
        }

        self.phase = phase;
        if phase != SessionPhase::ClarificationPending {
            self.clarification_submitted = false;
        }

        match phase {
            SessionPhase::ClarificationGenerating => {
                self.progress = Progress::clarification_generating();
                NextAction::None
            }
            SessionPhase::ClarificationPending => {
                self.progress = Progress::clarification_pending();
                NextAction::None
            }
            SessionPhase::Complete => {
                self.progress = Progress::complete();
                NextAction::RefetchHistory
            }
            _ => NextAction::None,
        }
    }

    fn apply_progress(
        &mut self,
        stage: Option<String>,
        percent: Option<f64>,
        description: Option<String>,
    ) {
        let stage = stage.unwrap_or_else(|| "processing".to_string());
        if let Some(round) = round_from_stage(&stage) {
            self.current_round = self.current_round.max(round);
        }
        self.progress = Progress {
            percent: Progress::clamp_percent(percent.unwrap_or(0.0)),
            description: description.unwrap_or_default(),
            stage,
        };
    }

    fn apply_output(
        &mut self,
        kind: MessageKind,
        content: String,
        agent: Option<String>,
        round: Option<u32>,
    ) {
        let tag = agent.as_deref().map(AgentTag::parse);
        self.messages.push(ChatMessage {
            kind,
            content: content.clone(),
            agent: tag.clone(),
            round,
            received_at: Utc::now(),
        });

        let (Some(round), Some(tag)) = (round, tag) else {
            return;
        };

        // Only the two debate agents fill round slots; other tags are
        // logged above but never round-tracked.
        match tag {
            AgentTag::Expansion => {
                self.rounds.entry(round).or_default().expansion = Some(content);
            }
            AgentTag::Compression => {
                self.rounds.entry(round).or_default().compression = Some(content);
            }
            _ => {}
        }

        self.current_round = self.current_round.max(round);
        self.progress = Progress::round(round, tag == AgentTag::Compression);
    }

    /// Replace the message log wholesale from the durable record.
    ///
    /// Reconciles any frames dropped during streaming with what the
    /// backend actually stored.
    pub fn replace_history(&mut self, turns: Vec<HistoryTurn>) {
        self.messages = turns.into_iter().map(HistoryTurn::into_message).collect();
    }

    /// Clone the current state for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            phase: self.phase,
            error: self.error.clone(),
            messages: self.messages.clone(),
            rounds: self.rounds.clone(),
            current_round: self.current_round,
            progress: self.progress.clone(),
            clarification_submitted: self.clarification_submitted,
        }
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(agent: &str, round: u32, content: &str) -> ServerEvent {
        ServerEvent::AgentOutput {
            content: content.to_string(),
            agent: Some(agent.to_string()),
            round: Some(round),
        }
    }

    #[test]
    fn test_state_change_sets_phase() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::StateChange {
            state: "ROUND_PROCESSING".to_string(),
        });
        assert_eq!(ctrl.phase(), SessionPhase::RoundProcessing);
    }

    #[test]
    fn test_unknown_state_token_keeps_phase() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::StateChange {
            state: "ROUND_PROCESSING".to_string(),
        });
        ctrl.apply(ServerEvent::StateChange {
            state: "SOMETHING_NEW".to_string(),
        });
        assert_eq!(ctrl.phase(), SessionPhase::RoundProcessing);
    }

    #[test]
    fn test_clarification_states_set_canned_progress() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::StateChange {
            state: "CLARIFICATION_GENERATING".to_string(),
        });
        assert_eq!(ctrl.snapshot().progress.percent, 5);

        ctrl.apply(ServerEvent::StateChange {
            state: "CLARIFICATION_PENDING".to_string(),
        });
        let progress = ctrl.snapshot().progress;
        assert_eq!(progress.percent, 10);
        assert_eq!(progress.stage, "clarification_pending");
    }

    #[test]
    fn test_complete_requests_history_refetch() {
        let mut ctrl = SessionController::new();
        let action = ctrl.apply(ServerEvent::StateChange {
            state: "COMPLETE".to_string(),
        });
        assert_eq!(action, NextAction::RefetchHistory);
        assert_eq!(ctrl.snapshot().progress.percent, 100);
    }

    #[test]
    fn test_error_event_is_terminal_and_sticky() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Error { content: None });
        assert_eq!(ctrl.phase(), SessionPhase::Error);
        assert_eq!(ctrl.error(), Some("Backend error"));

        // A queued state_change must not resurrect the session.
        let action = ctrl.apply(ServerEvent::StateChange {
            state: "COMPLETE".to_string(),
        });
        assert_eq!(action, NextAction::None);
        assert_eq!(ctrl.phase(), SessionPhase::Error);
    }

    #[test]
    fn test_error_event_carries_content() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Error {
            content: Some("model pool exhausted".to_string()),
        });
        assert_eq!(ctrl.error(), Some("model pool exhausted"));
    }

    #[test]
    fn test_progress_event_overwrites_with_defaults() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Progress {
            stage: None,
            progress_percent: None,
            description: None,
        });
        let progress = ctrl.snapshot().progress;
        assert_eq!(progress.stage, "processing");
        assert_eq!(progress.percent, 0);
        assert_eq!(progress.description, "");
    }

    #[test]
    fn test_progress_round_stage_advances_current_round() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Progress {
            stage: Some("round_3".to_string()),
            progress_percent: Some(44.0),
            description: Some("Round 3".to_string()),
        });
        assert_eq!(ctrl.snapshot().current_round, 3);
    }

    #[test]
    fn test_progress_percent_clamped_to_100() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Progress {
            stage: Some("processing".to_string()),
            progress_percent: Some(140.0),
            description: None,
        });
        assert_eq!(ctrl.snapshot().progress.percent, 100);
    }

    #[test]
    fn test_out_of_range_percent_still_advances_round_stage() {
        // The whole frame applies even when the percent needs clamping:
        // a wild number must not cost us the round_<N> advance.
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Progress {
            stage: Some("round_4".to_string()),
            progress_percent: Some(300.0),
            description: None,
        });
        let snapshot = ctrl.snapshot();
        assert_eq!(snapshot.current_round, 4);
        assert_eq!(snapshot.progress.percent, 100);
        assert_eq!(snapshot.progress.stage, "round_4");
    }

    #[test]
    fn test_fractional_percent_truncated() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Progress {
            stage: None,
            progress_percent: Some(42.5),
            description: None,
        });
        assert_eq!(ctrl.snapshot().progress.percent, 42);
    }

    #[test]
    fn test_agent_output_fills_round_slots() {
        let mut ctrl = SessionController::new();
        ctrl.apply(output("EXPANSION", 1, "widen"));
        ctrl.apply(output("COMPRESSION", 1, "narrow"));

        let snapshot = ctrl.snapshot();
        let round = &snapshot.rounds[&1];
        assert_eq!(round.expansion.as_deref(), Some("widen"));
        assert_eq!(round.compression.as_deref(), Some("narrow"));
        assert_eq!(snapshot.messages.len(), 2);
    }

    #[test]
    fn test_same_slot_overwrites_not_duplicates() {
        let mut ctrl = SessionController::new();
        ctrl.apply(output("EXPANSION", 2, "first draft"));
        ctrl.apply(output("EXPANSION", 2, "second draft"));

        let snapshot = ctrl.snapshot();
        assert_eq!(snapshot.rounds.len(), 1);
        assert_eq!(
            snapshot.rounds[&2].expansion.as_deref(),
            Some("second draft")
        );
        // Both arrivals stay in the log.
        assert_eq!(snapshot.messages.len(), 2);
    }

    #[test]
    fn test_unrecognized_agent_tag_not_round_tracked() {
        let mut ctrl = SessionController::new();
        ctrl.apply(output("MODERATOR", 1, "keep it civil"));

        let snapshot = ctrl.snapshot();
        assert!(snapshot.rounds.is_empty());
        assert_eq!(snapshot.messages.len(), 1);
        // Round number still advances the counter.
        assert_eq!(snapshot.current_round, 1);
    }

    #[test]
    fn test_output_without_round_only_logged() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::Synthesis {
            content: "the combined view".to_string(),
            agent: Some("SYNTHESIS".to_string()),
            round: None,
        });
        let snapshot = ctrl.snapshot();
        assert!(snapshot.rounds.is_empty());
        assert_eq!(snapshot.current_round, 0);
        assert_eq!(snapshot.messages[0].kind, MessageKind::Synthesis);
    }

    #[test]
    fn test_stale_epoch_dropped() {
        let mut ctrl = SessionController::new();
        let old = ctrl.begin_session();
        let _new = ctrl.begin_session();

        let result = ctrl.apply_if_current(old, ServerEvent::Error { content: None });
        assert!(result.is_none());
        assert_eq!(ctrl.phase(), SessionPhase::Init);
        assert!(ctrl.error().is_none());
    }

    #[test]
    fn test_begin_session_resets_everything() {
        let mut ctrl = SessionController::new();
        ctrl.adopt("sess-1", "ROUND_PROCESSING");
        ctrl.apply(output("EXPANSION", 2, "draft"));
        ctrl.apply(ServerEvent::Error { content: None });

        ctrl.begin_session();
        let snapshot = ctrl.snapshot();
        assert!(snapshot.session_id.is_none());
        assert_eq!(snapshot.phase, SessionPhase::Init);
        assert!(snapshot.error.is_none());
        assert!(snapshot.messages.is_empty());
        assert!(snapshot.rounds.is_empty());
        assert_eq!(snapshot.current_round, 0);
        assert_eq!(snapshot.progress.stage, "clarification_generating");
    }

    #[test]
    fn test_adopt_with_unknown_status_keeps_phase() {
        let mut ctrl = SessionController::new();
        ctrl.adopt("sess-1", "WARMING_UP");
        assert_eq!(ctrl.session_id(), Some("sess-1"));
        assert_eq!(ctrl.phase(), SessionPhase::Init);
    }

    #[test]
    fn test_clarification_submitted_clears_on_phase_change() {
        let mut ctrl = SessionController::new();
        ctrl.apply(ServerEvent::StateChange {
            state: "CLARIFICATION_PENDING".to_string(),
        });
        ctrl.mark_clarification_submitted();
        assert!(ctrl.snapshot().clarification_submitted);

        ctrl.apply(ServerEvent::StateChange {
            state: "CLARIFICATION_COMPLETE".to_string(),
        });
        assert!(!ctrl.snapshot().clarification_submitted);
    }

    #[test]
    fn test_replace_history_is_wholesale() {
        let mut ctrl = SessionController::new();
        ctrl.apply(output("EXPANSION", 1, "m1"));
        ctrl.apply(output("COMPRESSION", 1, "m2"));

        ctrl.replace_history(vec![
            HistoryTurn {
                agent: "EXPANSION".to_string(),
                content: "t1".to_string(),
                round_number: Some(1),
            },
            HistoryTurn {
                agent: "COMPRESSION".to_string(),
                content: "t2".to_string(),
                round_number: Some(1),
            },
            HistoryTurn {
                agent: "SYNTHESIS".to_string(),
                content: "t3".to_string(),
                round_number: None,
            },
        ]);

        let snapshot = ctrl.snapshot();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[2].kind, MessageKind::Synthesis);
    }
}
