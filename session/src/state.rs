//! Session lifecycle phases — the wire contract with the backend.
//!
//! The backend is the authority on legal sequencing; the client folds
//! whatever token it is sent. The one exception is `Error`, which is
//! sticky: once a session has failed, no later token moves it back.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of an advisory session.
///
/// Serialized forms are the exact case-sensitive tokens the backend
/// pushes in `state_change` events (e.g. `CLARIFICATION_PENDING`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Session created, init call in flight or just resolved.
    Init,
    /// Backend is generating clarification questions.
    ClarificationGenerating,
    /// Waiting for the user to answer clarification questions.
    ClarificationPending,
    /// Clarification answers accepted, debate about to start.
    ClarificationComplete,
    /// A debate round is in progress.
    RoundProcessing,
    /// Final synthesis is being produced.
    SynthesisProcessing,
    /// Debate finished, synthesis delivered.
    Complete,
    /// Session failed — terminal, only a fresh session recovers.
    Error,
}

/// A `state_change` token the client does not recognize.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized session phase token: {0}")]
pub struct UnknownPhase(pub String);

impl std::str::FromStr for SessionPhase {
    type Err = UnknownPhase;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "INIT" => Ok(Self::Init),
            "CLARIFICATION_GENERATING" => Ok(Self::ClarificationGenerating),
            "CLARIFICATION_PENDING" => Ok(Self::ClarificationPending),
            "CLARIFICATION_COMPLETE" => Ok(Self::ClarificationComplete),
            "ROUND_PROCESSING" => Ok(Self::RoundProcessing),
            "SYNTHESIS_PROCESSING" => Ok(Self::SynthesisProcessing),
            "COMPLETE" => Ok(Self::Complete),
            "ERROR" => Ok(Self::Error),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            Self::Init => "INIT",
            Self::ClarificationGenerating => "CLARIFICATION_GENERATING",
            Self::ClarificationPending => "CLARIFICATION_PENDING",
            Self::ClarificationComplete => "CLARIFICATION_COMPLETE",
            Self::RoundProcessing => "ROUND_PROCESSING",
            Self::SynthesisProcessing => "SYNTHESIS_PROCESSING",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
        };
        write!(f, "{}", token)
    }
}

impl SessionPhase {
    /// Whether this phase ends the session.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}
