//! Perspective chat client
//!
//! Transport and orchestration for the multi-perspective debate chat:
//! configuration, the synchronous HTTP backend calls (init, clarify,
//! history), the streaming ingestor, and the [`ChatClient`] facade
//! that ties them to the session state machine in
//! `perspective-session`.

pub mod backend;
pub mod client;
pub mod config;
pub mod stream;

pub use backend::{BackendError, ChatBackend, HttpBackend, InitResponse};
pub use client::{ChatClient, SharedController};
pub use config::{ClientConfig, ConfigError};
pub use stream::{StreamConnector, WsConnector, CONNECTION_ERROR};
