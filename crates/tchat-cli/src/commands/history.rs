//! /history command - window stats and a short preview

use super::CommandResult;
use crate::utils::truncate_chars;
use tchat_core::HistoryWindow;

const PREVIEW_CHARS: usize = 60;

pub struct HistoryCommand;

impl HistoryCommand {
    pub fn execute(history: &HistoryWindow) -> CommandResult {
        let mut output = format!("{} (max {})\n", history, history.capacity());

        let messages = history.snapshot();
        if messages.is_empty() {
            output.push_str("  (empty)");
            return CommandResult::Message(output);
        }

        for message in &messages {
            let text = message.text().replace('\n', " ");
            output.push_str(&format!(
                "  {:<9} {}\n",
                format!("{}:", message.role()),
                truncate_chars(&text, PREVIEW_CHARS)
            ));
        }
        output.pop();

        CommandResult::Message(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tchat_ai::Message;

    #[test]
    fn test_empty_history() {
        let history = HistoryWindow::new(3);
        match HistoryCommand::execute(&history) {
            CommandResult::Message(msg) => {
                assert!(msg.starts_with("History: 0 messages (0 user, 0 assistant) (max 3)"));
                assert!(msg.ends_with("(empty)"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_preview_is_truncated() {
        let history = HistoryWindow::new(3);
        history.append(Message::user("x".repeat(100)));
        history.append(Message::assistant("line one\nline two"));
        match HistoryCommand::execute(&history) {
            CommandResult::Message(msg) => {
                assert!(msg.contains(&format!("user:     {}...", "x".repeat(60))));
                assert!(msg.contains("assistant: line one line two"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
