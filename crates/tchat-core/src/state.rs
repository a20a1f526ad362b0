//! Mutable session settings shared by the prompt loop and commands.

use parking_lot::RwLock;

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct AppState {
    model: RwLock<String>,
    system_prompt: RwLock<String>,
}

impl AppState {
    /// Fails with [`Error::Configuration`] when `model` is blank.
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Result<Self> {
        let model = validate_model(model.into())?;
        Ok(Self {
            model: RwLock::new(model),
            system_prompt: RwLock::new(system_prompt.into()),
        })
    }

    pub fn model(&self) -> String {
        self.model.read().clone()
    }

    /// Switch models. Returns `true` when the model actually changed.
    pub fn set_model(&self, model: impl Into<String>) -> Result<bool> {
        let model = validate_model(model.into())?;
        let mut current = self.model.write();
        if *current == model {
            return Ok(false);
        }
        *current = model;
        Ok(true)
    }

    pub fn system_prompt(&self) -> String {
        self.system_prompt.read().clone()
    }

    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        *self.system_prompt.write() = prompt.into();
    }
}

fn validate_model(model: String) -> Result<String> {
    let model = model.trim().to_string();
    if model.is_empty() {
        return Err(Error::Configuration("model name cannot be empty".into()));
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_model_rejected() {
        assert!(matches!(
            AppState::new("  ", "sys"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_set_model_reports_change() {
        let state = AppState::new("llama3", "You are a helpful assistant").unwrap();
        assert!(!state.set_model("llama3").unwrap());
        assert!(state.set_model("llava").unwrap());
        assert_eq!(state.model(), "llava");
        assert!(state.set_model("").is_err());
        assert_eq!(state.model(), "llava");
    }

    #[test]
    fn test_system_prompt_roundtrip() {
        let state = AppState::new("llama3", "a").unwrap();
        state.set_system_prompt("be terse");
        assert_eq!(state.system_prompt(), "be terse");
    }
}
