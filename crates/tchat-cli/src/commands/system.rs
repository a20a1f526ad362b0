//! /system command - show or replace the system prompt

use super::CommandResult;

pub struct SystemCommand;

impl SystemCommand {
    pub fn execute(args: &str, current: &str) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(format!(
                "System prompt:\n  {}\n\nSet with: /system <text>",
                current
            ));
        }
        CommandResult::SetSystemPrompt(args.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_current() {
        match SystemCommand::execute("", "Be brief") {
            CommandResult::Message(msg) => assert!(msg.contains("  Be brief")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_set() {
        assert_eq!(
            SystemCommand::execute("Be verbose", "Be brief"),
            CommandResult::SetSystemPrompt("Be verbose".into())
        );
    }
}
