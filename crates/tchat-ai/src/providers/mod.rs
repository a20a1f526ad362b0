//! Model server implementations

pub mod ollama;

pub use ollama::OllamaProvider;
