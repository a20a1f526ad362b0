//! tchat-ai: wire types and streaming client for a local model server
//!
//! This crate provides the message model shared by the rest of the workspace
//! and a client for the Ollama HTTP API.

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::{ChatEvent, ChatEventStream};
pub use types::*;
