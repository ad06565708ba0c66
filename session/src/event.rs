//! Wire shapes pushed by the backend over the session stream, plus the
//! in-memory message log they fold into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A server-pushed frame on the session stream.
///
/// The `type` field discriminates. Tags the client does not know decode
/// to [`ServerEvent::Unknown`] and are dropped by the fold instead of
/// failing the whole frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The session moved to a new lifecycle phase.
    StateChange { state: String },

    /// Advisory progress update.
    ///
    /// `progress_percent` is any JSON number on the wire; the fold
    /// clamps it into 0..=100.
    Progress {
        #[serde(default)]
        stage: Option<String>,
        #[serde(default)]
        progress_percent: Option<f64>,
        #[serde(default)]
        description: Option<String>,
    },

    /// One agent's output for a debate round.
    AgentOutput {
        content: String,
        #[serde(default)]
        agent: Option<String>,
        #[serde(default)]
        round: Option<u32>,
    },

    /// The final combined output ending the debate.
    Synthesis {
        content: String,
        #[serde(default)]
        agent: Option<String>,
        #[serde(default)]
        round: Option<u32>,
    },

    /// Backend-reported failure — terminal for the session.
    Error {
        #[serde(default)]
        content: Option<String>,
    },

    /// Any event type this client version does not understand.
    #[serde(other)]
    Unknown,
}

/// Role tag attached to agent outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTag {
    /// First slot of a round — widens the option space.
    Expansion,
    /// Second slot of a round — prunes and sharpens.
    Compression,
    /// The final combined answer.
    Synthesis,
    /// Pre-debate question/answer exchange.
    Clarification,
    /// Anything else — kept verbatim, never round-tracked.
    Other(String),
}

impl AgentTag {
    /// Parse a wire tag. Never fails; unrecognized tags are preserved.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "EXPANSION" => Self::Expansion,
            "COMPRESSION" => Self::Compression,
            "SYNTHESIS" => Self::Synthesis,
            "CLARIFICATION" => Self::Clarification,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for AgentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expansion => write!(f, "EXPANSION"),
            Self::Compression => write!(f, "COMPRESSION"),
            Self::Synthesis => write!(f, "SYNTHESIS"),
            Self::Clarification => write!(f, "CLARIFICATION"),
            Self::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Kind of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Output from one debate agent.
    AgentOutput,
    /// The final synthesis.
    Synthesis,
}

/// One entry of the session's arrival-ordered message log.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub content: String,
    pub agent: Option<AgentTag>,
    pub round: Option<u32>,
    /// When this client received the message.
    pub received_at: DateTime<Utc>,
}

/// One stored turn from the backend's durable session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub agent: String,
    pub content: String,
    #[serde(default)]
    pub round_number: Option<u32>,
}

impl HistoryTurn {
    /// Map a stored turn into the shape used for streamed messages.
    ///
    /// Turns tagged `SYNTHESIS` become synthesis messages; everything
    /// else is generic agent output.
    pub fn into_message(self) -> ChatMessage {
        let agent = AgentTag::parse(&self.agent);
        let kind = if agent == AgentTag::Synthesis {
            MessageKind::Synthesis
        } else {
            MessageKind::AgentOutput
        };
        ChatMessage {
            kind,
            content: self.content,
            agent: Some(agent),
            round: self.round_number,
            received_at: Utc::now(),
        }
    }
}
