//! /show, /config and /version

use super::{CommandContext, CommandResult};
use crate::config::Config;
use crate::logging;
use crate::theme::SUPPORTED_COLORS;

pub struct ShowCommand;

impl ShowCommand {
    pub fn execute(ctx: &CommandContext<'_>) -> CommandResult {
        let model = ctx.state.model();
        let capabilities = ctx
            .catalog
            .get(&model)
            .map(|e| e.capabilities.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        CommandResult::Message(format!(
            "Model:         {}\nCapabilities:  {}\nSystem prompt: {}",
            model,
            capabilities,
            ctx.state.system_prompt()
        ))
    }
}

pub struct ConfigCommand;

impl ConfigCommand {
    pub fn execute(ctx: &CommandContext<'_>) -> CommandResult {
        let config = ctx.config;
        let color = |name: &Option<String>| name.clone().unwrap_or_else(|| "default".into());

        let mut output = String::from("Settings\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!("App dir:       {}\n", ctx.app_dir.display()));
        output.push_str(&format!(
            "Config file:   {}\n",
            Config::config_path(ctx.app_dir).display()
        ));
        output.push_str(&format!(
            "Log file:      {}\n",
            logging::log_path(ctx.app_dir).display()
        ));
        output.push_str(&format!("Ollama host:   {}\n", ctx.host));
        output.push_str(&format!("Model:         {}\n", ctx.state.model()));
        output.push_str(&format!("Max messages:  {}\n", ctx.history.capacity()));
        output.push_str(&format!("Log level:     {}\n", config.log_level()));
        output.push('\n');

        output.push_str("Colors:\n");
        output.push_str(&format!("  prompt:  {}\n", color(&config.colors.prompt)));
        output.push_str(&format!("  info:    {}\n", color(&config.colors.info)));
        output.push_str(&format!("  error:   {}\n", color(&config.colors.error)));
        output.push_str(&format!("  output:  {}\n", color(&config.colors.output)));
        output.push_str(&format!("  (available: {})", SUPPORTED_COLORS.join(", ")));

        CommandResult::Message(output)
    }
}

pub fn version_message() -> String {
    format!(
        "tchat {}\ncommit: {}\nbuilt:  {}\nos:     {}/{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("TCHAT_GIT_COMMIT").unwrap_or("unknown"),
        option_env!("TCHAT_BUILD_DATE").unwrap_or("unknown"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
