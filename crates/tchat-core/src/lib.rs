//! tchat-core: chat turn orchestration
//!
//! This crate holds the pieces that run one conversation turn: the bounded
//! history window, image references in user input, the streaming
//! orchestrator and single-flight cancellation.

pub mod cancel;
pub mod catalog;
pub mod error;
pub mod history;
pub mod media;
pub mod orchestrator;
pub mod state;
pub mod store;
pub mod transport;

pub use cancel::{ArmedGeneration, CancelCoordinator, Interrupt, listen_for_interrupts};
pub use catalog::{ModelCatalog, ModelEntry};
pub use error::{Error, Result};
pub use history::{HistoryStats, HistoryWindow};
pub use media::{ImageLoader, ImageReference, MediaError, ParsedInput, parse_input};
pub use orchestrator::{ChunkSink, GenerationRequest, GenerationResult, Orchestrator};
pub use state::AppState;
pub use store::{ConversationTurn, Session, Store, StoreError, StoreStats};
pub use transport::{ChatRequest, OllamaTransport, RetryConfig, Transport};
