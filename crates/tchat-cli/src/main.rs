//! tchat - terminal chat client for Ollama

mod app;
mod clipboard;
mod commands;
mod config;
mod logging;
mod session;
mod theme;
mod utils;

use std::sync::Arc;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tchat_ai::providers::OllamaProvider;
use tchat_core::{
    AppState, CancelCoordinator, HistoryWindow, ModelCatalog, OllamaTransport, Orchestrator,
    listen_for_interrupts,
};

use app::{ChatApp, Flow};
use config::Config;
use session::JsonlStore;

/// tchat - chat with local models from the terminal
#[derive(Parser, Debug)]
#[command(name = "tchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: config, then the first installed model)
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt for this run
    #[arg(short, long)]
    system: Option<String>,

    /// Ollama server address (default: config, then $OLLAMA_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Messages of history sent with each request
    #[arg(long)]
    max_messages: Option<i64>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let app_dir = Config::app_dir();

    // Initialize config and exit
    if args.init_config {
        match Config::init(&app_dir) {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if let Err(e) = std::fs::create_dir_all(&app_dir) {
        eprintln!(
            "Warning: Cannot create app directory {}: {}",
            app_dir.display(),
            e
        );
    }

    let cfg = Config::load(&app_dir);
    let log_file = logging::init(&app_dir, cfg.log_level(), args.verbose);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        app_dir = %app_dir.display(),
        "Starting tchat"
    );

    let host = cfg.ollama_host(args.host.as_deref());
    let provider = OllamaProvider::new(&host)?;
    let transport = Arc::new(OllamaTransport::new(provider));

    let catalog = match ModelCatalog::discover(transport.as_ref()).await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(%host, error = %e, "Model discovery failed");
            eprintln!("Error: Cannot reach Ollama at {}: {}", host, e);
            eprintln!("Is the server running? Start it with: ollama serve");
            std::process::exit(1);
        }
    };
    if catalog.is_empty() {
        eprintln!("Error: No models installed on {}", host);
        eprintln!("Pull one with: ollama pull llama3.2");
        std::process::exit(1);
    }

    let preferred = args.model.clone().or_else(|| cfg.model.clone());
    if let Some(name) = preferred.as_deref().filter(|name| !catalog.contains(name)) {
        eprintln!("Warning: Model '{}' is not installed, using default", name);
    }
    let Some(model) = catalog.pick(preferred.as_deref()).map(str::to_string) else {
        anyhow::bail!("no model available");
    };

    let system_prompt = args
        .system
        .clone()
        .unwrap_or_else(|| cfg.system_prompt().to_string());
    let state = AppState::new(model.as_str(), system_prompt)?;
    let history = HistoryWindow::new(args.max_messages.unwrap_or_else(|| cfg.max_messages()));
    tracing::info!(%model, %host, capacity = history.capacity(), "Configured");

    let coordinator = CancelCoordinator::new();
    let orchestrator = Orchestrator::new(transport);

    let mut app = ChatApp::new(
        orchestrator,
        coordinator.clone(),
        state,
        history,
        catalog,
        cfg,
        app_dir.clone(),
        host,
    );

    match JsonlStore::open(&app_dir) {
        Ok(store) => app.attach_store(Arc::new(store)).await,
        Err(e) => {
            tracing::warn!(error = %e, "Persistence disabled");
            eprintln!("Warning: Cannot open session store: {}", e);
        }
    }

    let interrupts = async_stream::stream! {
        while tokio::signal::ctrl_c().await.is_ok() {
            yield ();
        }
    };
    let listener = listen_for_interrupts(coordinator, interrupts);

    // Non-interactive mode
    if let Some(command) = args.command {
        app.run_turn(&command).await;
        app.shutdown().await;
        listener.abort();
        return Ok(());
    }

    let result = run_interactive(&mut app, log_file.is_some()).await;
    app.shutdown().await;
    listener.abort();
    result
}

async fn run_interactive(app: &mut ChatApp, file_logging: bool) -> anyhow::Result<()> {
    let theme = app.theme;
    let history_path = app.app_dir.join("history");

    let mut rl = DefaultEditor::new()?;
    if rl.load_history(&history_path).is_err() {
        tracing::debug!(path = %history_path.display(), "No input history yet");
    }

    println!("{}", theme.banner(&format!("tchat {}", env!("CARGO_PKG_VERSION"))));
    println!(
        "{}",
        theme.info(&format!(
            "Model: {} | {} | Type /help for commands",
            app.state.model(),
            app.history
        ))
    );
    if !file_logging {
        println!("{}", theme.error("Logging to stderr (log file unavailable)"));
    }
    println!();

    let prompt = theme.prompt("tchat> ").to_string();

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline(&prompt));

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                if app.handle_line(&line).await == Flow::Exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", theme.info("Use /quit or Ctrl-D to exit."));
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("{}", theme.error(&format!("Error: {:?}", err)));
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_path) {
        tracing::warn!(error = %e, "Failed to save input history");
    }
    println!("{}", theme.info("Goodbye!"));
    Ok(())
}
