//! Derived progress snapshot — advisory display state only.
//!
//! The heuristic assumes five debate rounds at 16 points each, with the
//! first 10 points reserved for clarification and the last 10 for
//! synthesis/completion. Never consulted for control flow.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ROUND_STAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"round_(\d+)").expect("ROUND_STAGE_RE regex should compile"));

/// Point offset reserved for the clarification phase.
const CLARIFICATION_OFFSET: u32 = 10;
/// Points one full round (both agents) contributes.
const POINTS_PER_ROUND: u32 = 16;
/// Cap below which round progress stays, reserving the rest for synthesis.
const ROUND_CAP: u32 = 90;

/// Advisory `{stage, percent, description}` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub stage: String,
    /// Always within 0..=100.
    pub percent: u8,
    pub description: String,
}

impl Progress {
    /// No session yet.
    pub fn idle() -> Self {
        Self {
            stage: "idle".to_string(),
            percent: 0,
            description: String::new(),
        }
    }

    /// Optimistic estimate shown while the init call is in flight.
    pub fn analyzing() -> Self {
        Self {
            stage: "clarification_generating".to_string(),
            percent: 5,
            description: "Analyzing and generating questions...".to_string(),
        }
    }

    /// Backend confirmed it is generating clarification questions.
    pub fn clarification_generating() -> Self {
        Self {
            stage: "clarification_generating".to_string(),
            percent: 5,
            description: "Generating clarification questions...".to_string(),
        }
    }

    /// Waiting on the user's clarification answers.
    pub fn clarification_pending() -> Self {
        Self {
            stage: "clarification_pending".to_string(),
            percent: 10,
            description: "Waiting for your answers...".to_string(),
        }
    }

    /// Session reached its terminal success state.
    pub fn complete() -> Self {
        Self {
            stage: "complete".to_string(),
            percent: 100,
            description: "Complete".to_string(),
        }
    }

    /// Snapshot for an agent turn within a debate round.
    ///
    /// The expansion half of a round earns 8 points, the compression
    /// half the full 16, offset by the clarification reserve and capped
    /// at 90.
    pub fn round(round: u32, compression: bool) -> Self {
        let turn_points = if compression { POINTS_PER_ROUND } else { 8 };
        let raw = CLARIFICATION_OFFSET + round.saturating_sub(1) * POINTS_PER_ROUND + turn_points;
        Self {
            stage: format!("round_{}", round),
            percent: raw.min(ROUND_CAP) as u8,
            description: format!("Round {}", round),
        }
    }

    /// Clamp an arbitrary wire percent into range.
    ///
    /// The backend sends a plain JSON number; anything outside 0..=100
    /// (or fractional, or non-finite) collapses to the nearest bound.
    pub fn clamp_percent(raw: f64) -> u8 {
        if raw.is_nan() {
            return 0;
        }
        raw.clamp(0.0, 100.0) as u8
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::idle()
    }
}

/// Extract the round number from a `round_<N>` stage label.
pub fn round_from_stage(stage: &str) -> Option<u32> {
    ROUND_STAGE_RE
        .captures(stage)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
