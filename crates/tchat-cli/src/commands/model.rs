//! /model command - list and switch models

use super::CommandResult;
use tchat_core::{ModelCatalog, ModelEntry};

pub struct ModelCommand;

impl ModelCommand {
    /// Execute /model command - lists models if no args, or switches to the matching model
    pub fn execute(args: &str, current_model: &str, catalog: &ModelCatalog) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(list_models(current_model, catalog));
        }

        match find_model(args, catalog) {
            Some(entry) => CommandResult::ChangeModel(entry.name().to_string()),
            None => CommandResult::Message(format!(
                "No model found matching '{}'\nUse /model to list available models",
                args
            )),
        }
    }
}

fn list_models(current: &str, catalog: &ModelCatalog) -> String {
    if catalog.is_empty() {
        return "No models available".to_string();
    }

    let mut output = String::from("Available models:\n");

    for (i, entry) in catalog.entries().iter().enumerate() {
        let marker = if entry.name() == current { " *" } else { "" };
        let size = entry
            .info
            .parameter_size
            .as_deref()
            .map(|s| format!(" {}", s))
            .unwrap_or_default();
        output.push_str(&format!(
            "  {:>2}. {}{}{}  [{}]\n",
            i + 1,
            entry.name(),
            size,
            marker,
            entry.capabilities
        ));
    }

    output.push_str("\nSwitch with: /model <number|name>");
    output
}

fn find_model<'a>(query: &str, catalog: &'a ModelCatalog) -> Option<&'a ModelEntry> {
    let entries = catalog.entries();

    // 1-based index from the listing
    if let Ok(n) = query.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| entries.get(i));
    }

    let query_lower = query.to_lowercase();

    // Exact match first
    if let Some(entry) = entries
        .iter()
        .find(|e| e.name().to_lowercase() == query_lower)
    {
        return Some(entry);
    }

    // Partial match
    entries
        .iter()
        .find(|e| e.name().to_lowercase().contains(&query_lower))
}
