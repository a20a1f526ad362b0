//! Terminal colors

use colored::{Color, ColoredString, Colorize};

use crate::config::ColorConfig;

pub const SUPPORTED_COLORS: &[&str] = &[
    "black", "red", "green", "yellow", "blue", "magenta", "cyan", "white",
];

/// Parse a configured color name. Unknown names render as white.
pub fn parse_color(name: &str) -> Color {
    match name.trim().to_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        _ => Color::White,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub prompt: Color,
    pub info: Color,
    pub error: Color,
    pub output: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            prompt: Color::Cyan,
            info: Color::Green,
            error: Color::Red,
            output: Color::Green,
        }
    }
}

impl Theme {
    pub fn from_config(colors: &ColorConfig) -> Self {
        let defaults = Self::default();
        let pick = |name: &Option<String>, fallback: Color| {
            name.as_deref().map(parse_color).unwrap_or(fallback)
        };
        Self {
            prompt: pick(&colors.prompt, defaults.prompt),
            info: pick(&colors.info, defaults.info),
            error: pick(&colors.error, defaults.error),
            output: pick(&colors.output, defaults.output),
        }
    }

    pub fn prompt(&self, text: &str) -> ColoredString {
        text.color(self.prompt)
    }

    pub fn info(&self, text: &str) -> ColoredString {
        text.color(self.info)
    }

    pub fn error(&self, text: &str) -> ColoredString {
        text.color(self.error)
    }

    pub fn output(&self, text: &str) -> ColoredString {
        text.color(self.output)
    }

    pub fn banner(&self, text: &str) -> ColoredString {
        text.yellow().bold()
    }
}
