//! Models discovered on the server at startup.

use tchat_ai::{Capabilities, ModelInfo, Result};

use crate::transport::Transport;

/// A discovered model with its capability flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub info: ModelInfo,
    pub capabilities: Capabilities,
}

impl ModelEntry {
    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// Ordered list of models available for chat.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn new(entries: Vec<ModelEntry>) -> Self {
        Self { entries }
    }

    /// List the server's models and look up each one's capabilities.
    ///
    /// A failed lookup leaves that model with default (empty) capabilities.
    pub async fn discover(transport: &dyn Transport) -> Result<Self> {
        let models = transport.list_models().await?;
        let mut entries = Vec::with_capacity(models.len());

        for info in models {
            let capabilities = match transport.capabilities(&info.name).await {
                Ok(caps) => caps,
                Err(e) => {
                    tracing::warn!(
                        model = %info.name,
                        error = %e,
                        "Failed to fetch model capabilities"
                    );
                    Capabilities::default()
                }
            };
            tracing::debug!(model = %info.name, %capabilities, "Discovered model");
            entries.push(ModelEntry { info, capabilities });
        }

        tracing::info!(count = entries.len(), "Models discovered");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The preferred model if it is available, otherwise the first one.
    pub fn pick(&self, preferred: Option<&str>) -> Option<&str> {
        preferred
            .and_then(|name| self.get(name))
            .or_else(|| self.entries.first())
            .map(ModelEntry::name)
    }

    /// Whether a model is known to accept images.
    pub fn supports_vision(&self, name: &str) -> bool {
        self.get(name).is_some_and(|e| e.capabilities.vision)
    }
}
