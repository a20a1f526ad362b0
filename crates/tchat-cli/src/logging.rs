//! Log file setup

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &["tchat", "tchat_cli", "tchat_core", "tchat_ai"];

/// Map a configured level name onto a tracing level, defaulting to info
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "debug" | "trace" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn filter_directives(level: &str) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|c| format!("{c}={level}")));
    directives.join(",")
}

pub fn log_path(app_dir: &Path) -> PathBuf {
    app_dir.join("logs").join("tchat.log")
}

/// Send logs to `<app_dir>/logs/tchat.log`. `RUST_LOG` overrides the level.
///
/// Falls back to warnings on stderr when the file cannot be opened.
/// Returns the log file path on success.
pub fn init(app_dir: &Path, level: &str, verbose: bool) -> Option<PathBuf> {
    let level = if verbose { "debug" } else { normalize_level(level) };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(level)));

    let path = log_path(app_dir);
    let file = path
        .parent()
        .map(fs::create_dir_all)
        .transpose()
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));

    match file {
        Ok(file) => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true),
                )
                .try_init();
            Some(path)
        }
        Err(e) => {
            eprintln!("Warning: Cannot open log file {}: {}", path.display(), e);
            let _ = tracing_subscriber::registry()
                .with(EnvFilter::new(filter_directives("warn")))
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("DEBUG"), "debug");
        assert_eq!(normalize_level("warning"), "warn");
        assert_eq!(normalize_level("error"), "error");
        assert_eq!(normalize_level("verbose"), "info");
    }

    #[test]
    fn test_filter_directives() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("tchat_core=debug"));
    }

    #[test]
    fn test_log_path() {
        assert_eq!(
            log_path(Path::new("/tmp/app")),
            PathBuf::from("/tmp/app/logs/tchat.log")
        );
    }
}
