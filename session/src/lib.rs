//! Perspective session core
//!
//! State synchronization layer for the multi-perspective debate chat
//! client: a small state machine that tracks an asynchronous,
//! multi-stage conversation (clarification → debate rounds → synthesis
//! → complete) driven by out-of-order, partial streaming updates.
//!
//! This crate is pure logic — decoding, folding, and derived display
//! state. Transport (HTTP calls and the streaming connection) lives in
//! `perspective-client`.

pub mod controller;
pub mod event;
pub mod progress;
pub mod state;
pub mod transcript;

// Re-export the types callers touch on every render.
pub use controller::{NextAction, RoundOutputs, SessionController, SessionSnapshot};
pub use event::{AgentTag, ChatMessage, HistoryTurn, MessageKind, ServerEvent};
pub use progress::Progress;
pub use state::{SessionPhase, UnknownPhase};
pub use transcript::{build_feed, FeedEntry, FeedRole};
