//! Foreground chat loop state: one turn at a time, commands in between

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tchat_ai::Message;
use tchat_core::{
    AppState, CancelCoordinator, ConversationTurn, GenerationRequest, HistoryWindow,
    ModelCatalog, Orchestrator, Session, Store, parse_input,
};

use crate::clipboard;
use crate::commands::{self, CLEAR_SCREEN, CommandContext, CommandResult, StatsCommand};
use crate::config::Config;
use crate::theme::Theme;

const HISTORY_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether the loop should keep reading input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct ChatApp {
    pub orchestrator: Orchestrator,
    pub coordinator: CancelCoordinator,
    pub state: AppState,
    pub history: HistoryWindow,
    pub catalog: ModelCatalog,
    pub store: Option<Arc<dyn Store>>,
    pub session: Option<Session>,
    pub config: Config,
    pub theme: Theme,
    pub app_dir: PathBuf,
    pub host: String,
    last_response: Option<String>,
}

impl ChatApp {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: Orchestrator,
        coordinator: CancelCoordinator,
        state: AppState,
        history: HistoryWindow,
        catalog: ModelCatalog,
        config: Config,
        app_dir: PathBuf,
        host: String,
    ) -> Self {
        let theme = Theme::from_config(&config.colors);
        Self {
            orchestrator,
            coordinator,
            state,
            history,
            catalog,
            store: None,
            session: None,
            config,
            theme,
            app_dir,
            host,
            last_response: None,
        }
    }

    /// Attach persistence: restores the saved history and opens a new session.
    ///
    /// Failures are logged and leave the app running without that piece.
    pub async fn attach_store(&mut self, store: Arc<dyn Store>) {
        match store.load_history().await {
            Ok(messages) if !messages.is_empty() => {
                tracing::info!(messages = messages.len(), "History restored");
                self.history.replace_all(messages);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load saved history"),
        }

        let session = Session::new(self.state.model());
        match store.create_session(&session).await {
            Ok(()) => {
                tracing::info!(
                    session_id = %session.session_id,
                    model = %session.model_name,
                    "Session started"
                );
                self.session = Some(session);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to create session"),
        }

        self.store = Some(store);
    }

    /// Handle one line of input: a slash command or a chat turn.
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        let ctx = CommandContext {
            state: &self.state,
            history: &self.history,
            catalog: &self.catalog,
            config: &self.config,
            app_dir: &self.app_dir,
            host: &self.host,
        };
        match commands::execute_command(line, &ctx) {
            Some(result) => self.apply_command(result).await,
            None => {
                self.run_turn(line).await;
                Flow::Continue
            }
        }
    }

    async fn apply_command(&mut self, result: CommandResult) -> Flow {
        match result {
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::ChangeModel(model) => match self.state.set_model(model.as_str()) {
                Ok(true) => {
                    self.history.clear();
                    tracing::info!(%model, "Model changed");
                    println!(
                        "{}",
                        self.theme
                            .info(&format!("Switched to {} (history cleared)", model))
                    );
                }
                Ok(false) => println!("{}", self.theme.info(&format!("Already using {}", model))),
                Err(e) => eprintln!("{}", self.theme.error(&format!("Error: {}", e))),
            },
            CommandResult::SetSystemPrompt(prompt) => {
                self.state.set_system_prompt(prompt);
                println!("{}", self.theme.info("System prompt updated"));
            }
            CommandResult::ResetHistory => {
                self.history.clear();
                println!("{}", self.theme.info("History cleared"));
            }
            CommandResult::ClearScreen => {
                print!("{}", CLEAR_SCREEN);
                let _ = io::stdout().flush();
            }
            CommandResult::CopyLastResponse => match &self.last_response {
                None => println!("{}", self.theme.info("Nothing to copy yet")),
                Some(text) => match clipboard::copy_to_clipboard(text) {
                    Ok(()) => println!(
                        "{}",
                        self.theme.info(&format!(
                            "Copied {} characters to clipboard",
                            text.chars().count()
                        ))
                    ),
                    Err(e) => eprintln!("{}", self.theme.error(&format!("Error: {:#}", e))),
                },
            },
            CommandResult::ShowStats => match &self.store {
                None => println!("{}", self.theme.info("Persistence is disabled")),
                Some(store) => match store.stats().await {
                    Ok(stats) => println!("{}", StatsCommand::format(&stats)),
                    Err(e) => eprintln!("{}", self.theme.error(&format!("Error: {}", e))),
                },
            },
            CommandResult::Exit => return Flow::Exit,
            CommandResult::Unknown(cmd) => {
                eprintln!("{}", self.theme.error(&format!("Unknown command: /{}", cmd)));
                println!("Type /help for available commands.");
            }
        }
        Flow::Continue
    }

    /// Run one generation and record it.
    pub async fn run_turn(&mut self, line: &str) {
        let parsed = parse_input(line);
        let model = self.state.model();

        if !parsed.image_paths.is_empty() {
            println!(
                "{}",
                self.theme
                    .info(&format!("📷 Detected {} image(s)", parsed.image_paths.len()))
            );
            if !self.catalog.supports_vision(&model) {
                println!(
                    "{}",
                    self.theme.error(&format!(
                        "Warning: {} does not report vision support",
                        model
                    ))
                );
            }
        }

        let request = GenerationRequest {
            user_text: parsed.text.clone(),
            model: model.clone(),
            system_prompt: Some(self.state.system_prompt()),
            history: self.history.snapshot(),
            image_paths: parsed.image_paths,
        };

        let theme = self.theme;
        let mut sink = move |chunk: &str| -> io::Result<()> {
            let mut out = io::stdout().lock();
            write!(out, "{}", theme.output(chunk))?;
            out.flush()
        };

        let armed = self.coordinator.arm();
        let outcome = self
            .orchestrator
            .generate(request, &mut sink, armed.token())
            .await;
        armed.finish();

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Generation could not start");
                eprintln!("{}", self.theme.error(&format!("Error: {}", e)));
                return;
            }
        };
        if result.chunk_count > 0 {
            println!();
        }

        if result.is_cancelled() {
            tracing::info!(
                model = %model,
                duration_ms = result.duration_ms,
                chunks = result.chunk_count,
                "Generation cancelled"
            );
            println!("{}", self.theme.error("Generation canceled by user"));
            return;
        }

        if let Some(e) = &result.error {
            tracing::error!(
                model = %model,
                error = %e,
                kind = e.kind(),
                duration_ms = result.duration_ms,
                chunks = result.chunk_count,
                "Generation failed"
            );
            eprintln!("{}", self.theme.error(&format!("Error: {}", e)));
            return;
        }

        tracing::info!(
            model = %model,
            duration_ms = result.duration_ms,
            ttfc_ms = result.time_to_first_chunk_ms,
            chunks = result.chunk_count,
            output_length = result.output_text.chars().count(),
            images_loaded = result.images_loaded,
            "Generation complete"
        );

        if result.images_loaded > 0 {
            println!(
                "{}",
                self.theme
                    .info(&format!("✓ Processed {} image(s)", result.images_loaded))
            );
        }

        self.history.append(Message::user(parsed.text.as_str()));
        self.history
            .append(Message::assistant(result.output_text.as_str()));
        self.last_response = Some(result.output_text.clone());

        if let (Some(store), Some(session)) = (&self.store, &self.session) {
            let turn = ConversationTurn::from_result(&session.session_id, &model, line, &result);
            match store.save_turn(&turn).await {
                Ok(turn_id) => tracing::debug!(turn_id, "Turn saved"),
                Err(e) => tracing::warn!(error = %e, "Failed to save turn"),
            }
        }
    }

    /// Persist the history window, giving up after a few seconds.
    pub async fn shutdown(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let messages = self.history.snapshot();
        match tokio::time::timeout(HISTORY_SAVE_TIMEOUT, store.save_history(&messages)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to save history"),
            Err(_) => tracing::warn!("Timed out saving history"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tchat_ai::{Capabilities, ChatEvent, ChatEventStream, ModelInfo, Usage};
    use tchat_core::{ChatRequest, ModelEntry, Transport};
    use tokio_util::sync::CancellationToken;

    use crate::session::JsonlStore;

    /// How the fake server answers
    #[derive(Clone, Copy)]
    enum Reply {
        /// "Hi there" in two chunks
        Echo,
        /// One chunk, then a server error
        FailAfterChunk,
        /// One chunk, then nothing until cancelled
        HangAfterChunk,
    }

    struct ScriptedTransport(Reply);

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn list_models(&self) -> tchat_ai::Result<Vec<ModelInfo>> {
            Ok(vec![])
        }

        async fn capabilities(&self, _model: &str) -> tchat_ai::Result<Capabilities> {
            Ok(Capabilities::default())
        }

        async fn stream(
            &self,
            _request: ChatRequest,
            _cancel: CancellationToken,
        ) -> tchat_ai::Result<ChatEventStream> {
            let reply = self.0;
            Ok(Box::pin(async_stream::stream! {
                match reply {
                    Reply::Echo => {
                        yield ChatEvent::delta("Hi ");
                        yield ChatEvent::delta("there");
                        yield ChatEvent::Done { usage: Usage::default() };
                    }
                    Reply::FailAfterChunk => {
                        yield ChatEvent::delta("Hal");
                        yield ChatEvent::Error { message: "model crashed".into() };
                    }
                    Reply::HangAfterChunk => {
                        yield ChatEvent::delta("Hal");
                        futures::future::pending::<()>().await;
                    }
                }
            }))
        }
    }

    fn app_with(reply: Reply) -> ChatApp {
        let catalog = ModelCatalog::new(
            ["llama3", "llava"]
                .into_iter()
                .map(|name| ModelEntry {
                    info: ModelInfo {
                        name: name.into(),
                        ..Default::default()
                    },
                    capabilities: Capabilities::from_flags(["completion"]),
                })
                .collect(),
        );
        ChatApp::new(
            Orchestrator::new(Arc::new(ScriptedTransport(reply))),
            CancelCoordinator::new(),
            AppState::new("llama3", "Be brief").unwrap(),
            HistoryWindow::new(4),
            catalog,
            Config::default(),
            PathBuf::from("/tmp/tchat-test"),
            "http://localhost:11434".into(),
        )
    }

    fn app() -> ChatApp {
        app_with(Reply::Echo)
    }

    /// App with a store, one earlier exchange in history and a previous reply
    async fn seeded_app(reply: Reply, dir: &std::path::Path) -> ChatApp {
        let mut app = app_with(reply);
        app.attach_store(Arc::new(JsonlStore::open(dir).unwrap())).await;
        app.history.append(Message::user("earlier"));
        app.history.append(Message::assistant("answer"));
        app.last_response = Some("answer".into());
        app
    }

    async fn assert_turn_discarded(app: &ChatApp) {
        assert_eq!(app.history.count(), 2);
        assert_eq!(app.history.snapshot()[1].text(), "answer");
        assert_eq!(app.last_response.as_deref(), Some("answer"));
        assert!(!app.coordinator.is_armed());
        let stats = app.store.as_ref().unwrap().stats().await.unwrap();
        assert_eq!(stats.total_turns, 0);
    }

    #[tokio::test]
    async fn test_failed_turn_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = seeded_app(Reply::FailAfterChunk, dir.path()).await;

        assert_eq!(app.handle_line("hello").await, Flow::Continue);

        assert_turn_discarded(&app).await;
    }

    #[tokio::test]
    async fn test_cancelled_turn_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = seeded_app(Reply::HangAfterChunk, dir.path()).await;

        let coordinator = app.coordinator.clone();
        tokio::spawn(async move {
            while !coordinator.is_armed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            coordinator.interrupt();
        });

        assert_eq!(app.handle_line("hello").await, Flow::Continue);

        assert_turn_discarded(&app).await;
    }

    #[tokio::test]
    async fn test_turn_updates_history_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app();
        app.attach_store(Arc::new(JsonlStore::open(dir.path()).unwrap()))
            .await;

        assert_eq!(app.handle_line("hello").await, Flow::Continue);

        let history = app.history.snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text(), "hello");
        assert_eq!(history[1].text(), "Hi there");
        assert_eq!(app.last_response.as_deref(), Some("Hi there"));
        assert!(!app.coordinator.is_armed());

        let stats = app.store.as_ref().unwrap().stats().await.unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.total_turns, 1);
    }

    #[tokio::test]
    async fn test_model_switch_clears_history() {
        let mut app = app();
        app.handle_line("hello").await;
        assert_eq!(app.history.count(), 2);

        app.handle_line("/model llava").await;
        assert_eq!(app.state.model(), "llava");
        assert!(app.history.is_empty());
    }

    #[tokio::test]
    async fn test_exit_and_system_prompt() {
        let mut app = app();
        assert_eq!(app.handle_line("/system Be terse").await, Flow::Continue);
        assert_eq!(app.state.system_prompt(), "Be terse");
        assert_eq!(app.handle_line("/quit").await, Flow::Exit);
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut app = app();
            app.attach_store(Arc::new(JsonlStore::open(dir.path()).unwrap()))
                .await;
            app.handle_line("hello").await;
            app.shutdown().await;
        }

        let mut app = app();
        app.attach_store(Arc::new(JsonlStore::open(dir.path()).unwrap()))
            .await;
        assert_eq!(app.history.count(), 2);
        assert_eq!(app.history.snapshot()[1].text(), "Hi there");
    }
}
