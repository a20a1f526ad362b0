//! Drives one streamed generation and measures it.

use std::io;
use std::sync::Arc;

use futures::StreamExt;
use tchat_ai::{ChatEvent, Message, Usage};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::media::{ImageLoader, build_user_message};
use crate::transport::{ChatRequest, Transport};

/// Receives reply chunks in arrival order.
pub trait ChunkSink: Send {
    fn write_chunk(&mut self, chunk: &str) -> io::Result<()>;
}

impl<F> ChunkSink for F
where
    F: FnMut(&str) -> io::Result<()> + Send,
{
    fn write_chunk(&mut self, chunk: &str) -> io::Result<()> {
        self(chunk)
    }
}

/// Input for a single turn.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub user_text: String,
    pub model: String,
    pub system_prompt: Option<String>,
    /// Prior turns, oldest first
    pub history: Vec<Message>,
    pub image_paths: Vec<String>,
}

/// Outcome and metrics of a turn. Metrics are filled even when `error` is set.
#[derive(Debug, Default)]
pub struct GenerationResult {
    pub output_text: String,
    pub duration_ms: u64,
    /// Zero when no chunk arrived
    pub time_to_first_chunk_ms: u64,
    pub chunk_count: usize,
    pub images_loaded: usize,
    pub usage: Usage,
    pub error: Option<Error>,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(Error::is_cancelled)
    }
}

/// Runs generations against a [`Transport`].
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn Transport>,
    images: ImageLoader,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            images: ImageLoader::new(),
        }
    }

    pub fn with_image_loader(mut self, images: ImageLoader) -> Self {
        self.images = images;
        self
    }

    /// Run one turn, forwarding every chunk to `sink` as it arrives.
    ///
    /// Returns `Err` only when the turn could not start (no model). Every
    /// other failure, including cancellation through `cancel`, is reported
    /// in [`GenerationResult::error`] alongside the partial metrics.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        sink: &mut dyn ChunkSink,
        cancel: CancellationToken,
    ) -> Result<GenerationResult> {
        if request.model.trim().is_empty() {
            return Err(Error::Configuration("no model selected".into()));
        }

        let started = Instant::now();
        let mut result = GenerationResult::default();

        let images = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Cancelled while loading images");
                result.duration_ms = elapsed_ms(started);
                result.error = Some(Error::Cancelled);
                return Ok(result);
            }
            images = self.images.load_all(&request.image_paths) => images,
        };
        result.images_loaded = images.len();
        if images.len() < request.image_paths.len() {
            tracing::debug!(
                requested = request.image_paths.len(),
                loaded = images.len(),
                "Some images could not be loaded"
            );
        }

        let mut messages = request.history;
        messages.push(build_user_message(&request.user_text, &images));

        let chat = ChatRequest {
            model: request.model,
            system_prompt: request.system_prompt,
            messages,
        };

        let outcome = self
            .drive(chat, sink, &cancel, started, &mut result)
            .await;
        result.duration_ms = elapsed_ms(started);

        if let Err(e) = outcome {
            result.error = Some(if cancel.is_cancelled() {
                Error::Cancelled
            } else {
                e
            });
        }

        Ok(result)
    }

    async fn drive(
        &self,
        request: ChatRequest,
        sink: &mut dyn ChunkSink,
        cancel: &CancellationToken,
        started: Instant,
        result: &mut GenerationResult,
    ) -> Result<()> {
        let mut stream = self.transport.stream(request, cancel.clone()).await?;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                event = stream.next() => event,
            };

            match event {
                Some(ChatEvent::Delta { text }) => {
                    if result.chunk_count == 0 {
                        result.time_to_first_chunk_ms = elapsed_ms(started);
                    }
                    result.chunk_count += 1;
                    result.output_text.push_str(&text);
                    sink.write_chunk(&text).map_err(Error::Sink)?;
                }
                Some(ChatEvent::Done { usage }) => {
                    result.usage = usage;
                    return Ok(());
                }
                Some(ChatEvent::Error { message }) => {
                    return Err(tchat_ai::Error::Stream(message).into());
                }
                None => {
                    return Err(tchat_ai::Error::UnexpectedResponse(
                        "stream ended before completion".into(),
                    )
                    .into());
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelCoordinator;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tchat_ai::{Capabilities, ChatEventStream, Content, ModelInfo};

    /// One scripted step of a mock reply
    #[derive(Clone)]
    enum Step {
        Wait(u64),
        Event(ChatEvent),
        Hang,
    }

    struct MockTransport {
        steps: Vec<Step>,
        fail_with: Mutex<Option<tchat_ai::Error>>,
        last_request: Mutex<Option<ChatRequest>>,
    }

    impl MockTransport {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps,
                fail_with: Mutex::new(None),
                last_request: Mutex::new(None),
            })
        }

        fn failing(error: tchat_ai::Error) -> Arc<Self> {
            Arc::new(Self {
                steps: vec![],
                fail_with: Mutex::new(Some(error)),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn list_models(&self) -> tchat_ai::Result<Vec<ModelInfo>> {
            Ok(vec![])
        }

        async fn capabilities(&self, _model: &str) -> tchat_ai::Result<Capabilities> {
            Ok(Capabilities::default())
        }

        async fn stream(
            &self,
            request: ChatRequest,
            _cancel: CancellationToken,
        ) -> tchat_ai::Result<ChatEventStream> {
            *self.last_request.lock() = Some(request);
            if let Some(e) = self.fail_with.lock().take() {
                return Err(e);
            }
            let steps = self.steps.clone();
            Ok(Box::pin(async_stream::stream! {
                for step in steps {
                    match step {
                        Step::Wait(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                        Step::Event(event) => yield event,
                        Step::Hang => futures::future::pending::<()>().await,
                    }
                }
            }))
        }
    }

    fn delta(text: &str) -> Step {
        Step::Event(ChatEvent::delta(text))
    }

    fn done() -> Step {
        Step::Event(ChatEvent::Done {
            usage: Usage { input: 7, output: 2 },
        })
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            user_text: "hi".into(),
            model: "llama3".into(),
            system_prompt: Some("be brief".into()),
            ..Default::default()
        }
    }

    /// Sink that records every chunk it receives
    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&str) -> io::Result<()> + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        (seen, move |chunk: &str| -> io::Result<()> {
            sink_seen.lock().push(chunk.to_string());
            Ok(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_for_two_chunks() {
        let transport = MockTransport::new(vec![
            Step::Wait(10),
            delta("Hel"),
            Step::Wait(30),
            delta("lo"),
            done(),
        ]);
        let orchestrator = Orchestrator::new(transport);
        let (seen, mut sink) = recorder();

        let result = orchestrator
            .generate(request(), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.output_text, "Hello");
        assert_eq!(result.chunk_count, 2);
        assert_eq!(result.time_to_first_chunk_ms, 10);
        assert!(result.duration_ms >= 40);
        assert_eq!(result.usage.output, 2);
        assert_eq!(*seen.lock(), vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_no_chunks_means_zero_ttfc() {
        let orchestrator = Orchestrator::new(MockTransport::new(vec![done()]));
        let mut sink = |_: &str| -> io::Result<()> { Ok(()) };

        let result = orchestrator
            .generate(request(), &mut sink, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.chunk_count, 0);
        assert_eq!(result.time_to_first_chunk_ms, 0);
        assert_eq!(result.output_text, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_after_first_chunk() {
        let transport = MockTransport::new(vec![
            delta("a"),
            Step::Wait(50),
            delta("b"),
            done(),
        ]);
        let orchestrator = Orchestrator::new(transport);
        let coordinator = CancelCoordinator::new();
        let armed = coordinator.arm();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink_coordinator = coordinator.clone();
        let mut sink = move |chunk: &str| -> io::Result<()> {
            sink_seen.lock().push(chunk.to_string());
            sink_coordinator.interrupt();
            Ok(())
        };

        let result = orchestrator
            .generate(request(), &mut sink, armed.token())
            .await
            .unwrap();
        armed.finish();

        assert!(result.is_cancelled());
        assert_eq!(result.chunk_count, 1);
        assert_eq!(result.output_text, "a");
        assert_eq!(*seen.lock(), vec!["a"]);
        assert!(!coordinator.is_armed());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_chunk() {
        let transport = MockTransport::new(vec![delta("partial"), Step::Hang]);
        let orchestrator = Orchestrator::new(transport);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let (_, mut sink) = recorder();
        let result = orchestrator
            .generate(request(), &mut sink, cancel)
            .await
            .unwrap();

        assert!(result.is_cancelled());
        assert_eq!(result.chunk_count, 1);
        assert_eq!(result.output_text, "partial");
    }

    #[tokio::test]
    async fn test_backend_error_keeps_partial_metrics() {
        let transport = MockTransport::new(vec![
            delta("par"),
            Step::Event(ChatEvent::Error {
                message: "model crashed".into(),
            }),
        ]);
        let (_, mut sink) = recorder();
        let result = Orchestrator::new(transport)
            .generate(request(), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.chunk_count, 1);
        assert_eq!(result.output_text, "par");
        match result.error {
            Some(Error::Backend(tchat_ai::Error::Stream(message))) => {
                assert_eq!(message, "model crashed")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_backend_error() {
        let transport = MockTransport::failing(tchat_ai::Error::api(500, "boom"));
        let (_, mut sink) = recorder();
        let result = Orchestrator::new(transport)
            .generate(request(), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(result.error, Some(Error::Backend(_))));
        assert_eq!(result.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_truncated_stream_is_backend_error() {
        let transport = MockTransport::new(vec![delta("Hel")]);
        let (_, mut sink) = recorder();
        let result = Orchestrator::new(transport)
            .generate(request(), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            result.error,
            Some(Error::Backend(tchat_ai::Error::UnexpectedResponse(_)))
        ));
        assert_eq!(result.output_text, "Hel");
    }

    #[tokio::test]
    async fn test_sink_failure_ends_turn() {
        let transport = MockTransport::new(vec![delta("a"), delta("b"), done()]);
        let mut sink = |_: &str| -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        };

        let result = Orchestrator::new(transport)
            .generate(request(), &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(result.error, Some(Error::Sink(_))));
        assert_eq!(result.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_empty_model_fails_fast() {
        let transport = MockTransport::new(vec![done()]);
        let orchestrator = Orchestrator::new(transport.clone());
        let (_, mut sink) = recorder();

        let err = orchestrator
            .generate(
                GenerationRequest {
                    model: String::new(),
                    ..request()
                },
                &mut sink,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(transport.last_request.lock().is_none());
    }

    #[tokio::test]
    async fn test_history_precedes_current_message() {
        let transport = MockTransport::new(vec![delta("ok"), done()]);
        let orchestrator = Orchestrator::new(transport.clone());
        let (_, mut sink) = recorder();

        let req = GenerationRequest {
            history: vec![Message::user("first"), Message::assistant("reply")],
            user_text: "second".into(),
            ..request()
        };
        orchestrator
            .generate(req, &mut sink, CancellationToken::new())
            .await
            .unwrap();

        let sent = transport.last_request.lock().take().unwrap();
        let texts: Vec<String> = sent.messages.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["first", "reply", "second"]);
        assert_eq!(sent.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(sent.model, "llama3");
    }

    #[tokio::test]
    async fn test_unsupported_image_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let tiff = dir.path().join("scan.tiff");
        std::fs::write(&tiff, b"II*").unwrap();

        let transport = MockTransport::new(vec![delta("no image"), done()]);
        let orchestrator = Orchestrator::new(transport.clone());
        let (_, mut sink) = recorder();

        let req = GenerationRequest {
            user_text: "what is this".into(),
            image_paths: vec![tiff.to_string_lossy().into_owned()],
            ..request()
        };
        let result = orchestrator
            .generate(req, &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.images_loaded, 0);
        let sent = transport.last_request.lock().take().unwrap();
        let current = sent.messages.last().unwrap();
        assert_eq!(current.content().len(), 1);
        assert_eq!(current.text(), "what is this");
    }

    #[tokio::test]
    async fn test_loaded_image_is_attached() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("chart.png");
        std::fs::write(&png, b"\x89PNG").unwrap();

        let transport = MockTransport::new(vec![delta("a chart"), done()]);
        let orchestrator = Orchestrator::new(transport.clone());
        let (_, mut sink) = recorder();

        let req = GenerationRequest {
            image_paths: vec![png.to_string_lossy().into_owned()],
            ..request()
        };
        let result = orchestrator
            .generate(req, &mut sink, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.images_loaded, 1);
        let sent = transport.last_request.lock().take().unwrap();
        let parts = sent.messages.last().unwrap().content().to_vec();
        assert!(matches!(&parts[0], Content::Text { .. }));
        assert!(matches!(&parts[1], Content::Media { mime_type, .. } if mime_type == "image/png"));
    }

    /// Accepts connections and never answers them
    async fn silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_interrupt_while_downloading_images() {
        let base = silent_server().await;
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        let transport = MockTransport::new(vec![delta("late"), done()]);
        let orchestrator = Orchestrator::new(transport.clone())
            .with_image_loader(ImageLoader::with_client(client));

        let coordinator = CancelCoordinator::new();
        let armed = coordinator.arm();
        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.interrupt();
        });

        let req = GenerationRequest {
            image_paths: vec![format!("{base}/a.png"), format!("{base}/b.png")],
            ..request()
        };
        let (seen, mut sink) = recorder();
        let started = std::time::Instant::now();
        let result = orchestrator
            .generate(req, &mut sink, armed.token())
            .await
            .unwrap();
        armed.finish();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(result.is_cancelled());
        assert_eq!(result.images_loaded, 0);
        assert_eq!(result.chunk_count, 0);
        assert!(seen.lock().is_empty());
        assert!(transport.last_request.lock().is_none());
        assert!(!coordinator.is_armed());
    }
}
