//! Streaming session control: one request, one terminal outcome.
//!
//! A [`StreamSession`] drives a single completion exchange. The caller gets
//! back a [`SessionHandle`] immediately; fragments are applied by a spawned
//! drive loop that publishes live snapshots of the growing assistant
//! message. The handle settles exactly once:
//!
//! - success: the terminal message holds the full streamed text;
//! - cancellation: the terminal message holds the partial text plus a
//!   visible truncation marker, and `join` still resolves `Ok`; cancelled
//!   is a kind of success, so callers need no separate code path for a
//!   user-initiated stop;
//! - error: `join` rejects with a classified [`Error`] and no terminal
//!   message is produced.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::Stream;
use futures::stream::StreamExt;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::OpenAi;
use crate::error::{Error, Result};
use crate::observability;
use crate::types::{ChatMessage, CompletionChunk, CompletionRequest, Model, WireMessage};

/// Marker appended to the visible text when a session is cancelled
/// mid-stream.
pub const TRUNCATION_MARKER: &str = "...";

/// System prompt transmitted when the conversation does not open with a
/// system turn of its own.
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer as concisely as you can.";

/// Shared pause flag for streaming sessions.
///
/// The gate is one mutable cell passed by reference into the session and
/// read at the moment each fragment is applied, so every holder (host,
/// handle, UI tick) observes and controls the same state. Pausing affects
/// observability, not transport: the byte stream keeps flowing and
/// fragments keep accumulating in the session's buffer.
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: AtomicBool,
    nudge: Notify,
}

impl PauseGate {
    /// Creates a gate in the un-paused state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses observable updates until [`resume`](Self::resume).
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            observability::SESSION_PAUSES.click();
        }
    }

    /// Lifts the pause; everything buffered while paused becomes visible as
    /// one update.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.nudge.notify_one();
    }

    /// Flips the pause state and returns the new value.
    pub fn toggle(&self) -> bool {
        if self.is_paused() {
            self.resume();
            false
        } else {
            self.pause();
            true
        }
    }

    /// Returns the current pause state.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Resolves when the gate has been nudged by a resume.
    pub(crate) async fn nudged(&self) {
        self.nudge.notified().await;
    }
}

/// Per-session request options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// The model to request a completion from.
    pub model: Model,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Optional cap on generated tokens.
    pub max_tokens: Option<u32>,

    /// System prompt used when the conversation does not open with its own
    /// system turn. `None` falls back to a built-in default.
    pub system_prompt: Option<String>,
}

impl SessionOptions {
    /// Creates options for `model` with everything else defaulted.
    pub fn new(model: Model) -> Self {
        Self {
            model,
            temperature: None,
            max_tokens: None,
            system_prompt: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the generated-token cap.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the system prompt used for the transmission-only prefix.
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }
}

/// Entry points for driving one streaming exchange.
pub struct StreamSession;

impl StreamSession {
    /// Starts a streaming exchange over `messages`.
    ///
    /// Validation failures (empty conversation, blank model identifier) and
    /// connection-time failures surface here; failures after the stream is
    /// open reject [`SessionHandle::join`] instead.
    ///
    /// If the first message is not a system turn, a system turn is
    /// prepended to the transmitted sequence. The prefix is a
    /// transmission-only transformation: the caller's history and the
    /// terminal message never contain it.
    pub async fn start(
        client: &OpenAi,
        messages: &[ChatMessage],
        options: SessionOptions,
        gate: Arc<PauseGate>,
    ) -> Result<SessionHandle> {
        if messages.is_empty() {
            return Err(Error::validation(
                "conversation must contain at least one message",
                Some("messages".to_string()),
            ));
        }
        let model_id = options.model.to_string();
        if model_id.trim().is_empty() {
            return Err(Error::validation(
                "model identifier must not be blank",
                Some("model".to_string()),
            ));
        }

        let wire = wire_messages(messages, options.system_prompt.as_deref());
        let request = CompletionRequest::new(model_id, wire)
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens);

        let stream = client.stream(request).await?;
        Ok(Self::attach(stream, options.model, gate))
    }

    /// Attaches a session to an already-open fragment stream.
    ///
    /// This is the transport-independent half of [`start`](Self::start):
    /// anything that yields [`CompletionChunk`]s in arrival order can feed a
    /// session.
    pub fn attach<S>(stream: S, model: Model, gate: Arc<PauseGate>) -> SessionHandle
    where
        S: Stream<Item = Result<CompletionChunk>> + Send + 'static,
    {
        observability::SESSION_STARTS.click();
        let message = ChatMessage::assistant(model);
        let (live_tx, live_rx) = watch::channel(message.clone());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(
            stream,
            message,
            live_tx,
            cancel.clone(),
            Arc::clone(&gate),
        ));
        SessionHandle {
            cancel,
            gate,
            live: live_rx,
            task,
        }
    }
}

/// Builds the wire sequence for transmission, prepending a system turn when
/// the conversation does not open with one.
fn wire_messages(messages: &[ChatMessage], system_prompt: Option<&str>) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    if !messages[0].is_system() {
        wire.push(WireMessage::system(
            system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT),
        ));
    }
    wire.extend(messages.iter().map(WireMessage::from));
    wire
}

/// Handle to one in-flight streaming session.
///
/// Exactly one terminal outcome occurs per session; [`join`](Self::join)
/// consumes the handle to guarantee it is observed at most once.
#[derive(Debug)]
pub struct SessionHandle {
    cancel: CancellationToken,
    gate: Arc<PauseGate>,
    live: watch::Receiver<ChatMessage>,
    task: JoinHandle<Result<ChatMessage>>,
}

impl SessionHandle {
    /// Requests cancellation of the underlying transfer.
    ///
    /// Idempotent and non-blocking. The session still settles: `join`
    /// resolves with the partial text plus a truncation marker. Cancelling
    /// after natural completion has no effect.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a token that cancels this session, usable after the handle
    /// itself has been consumed by [`join`](Self::join).
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Suppresses observable updates; fragments keep accumulating.
    pub fn pause(&self) {
        self.gate.pause();
    }

    /// Lifts the pause and flushes everything buffered while paused.
    pub fn resume(&self) {
        self.gate.resume();
    }

    /// Flips the pause state and returns the new value.
    pub fn toggle_pause(&self) -> bool {
        self.gate.toggle()
    }

    /// Returns the current pause state.
    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Subscribes to live snapshots of the in-progress assistant message.
    ///
    /// Every snapshot shares one id with the terminal message, so consumers
    /// can render updates in place. After an error termination the last
    /// snapshot is stale; callers learn the outcome from `join` and must
    /// not keep partial text from a rejected session.
    pub fn subscribe(&self) -> watch::Receiver<ChatMessage> {
        self.live.clone()
    }

    /// The id shared by every emission of this session's reply.
    pub fn message_id(&self) -> String {
        self.live.borrow().id.clone()
    }

    /// Waits for the terminal outcome.
    pub async fn join(self) -> Result<ChatMessage> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => Err(Error::streaming(
                format!("session task failed: {err}"),
                Some(Box::new(err)),
            )),
        }
    }
}

/// The drive loop: applies fragments in arrival order, consults the pause
/// gate as each one lands, and produces the session's single terminal
/// outcome.
async fn drive<S>(
    stream: S,
    mut message: ChatMessage,
    live: watch::Sender<ChatMessage>,
    cancel: CancellationToken,
    gate: Arc<PauseGate>,
) -> Result<ChatMessage>
where
    S: Stream<Item = Result<CompletionChunk>> + Send + 'static,
{
    tokio::pin!(stream);
    // Set once fragments have been applied but not published.
    let mut withheld = false;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // A fragment may already be in flight behind the
                // cancellation request; breaking here guarantees it is
                // never applied.
                message.push_fragment(TRUNCATION_MARKER);
                let _ = live.send(message.clone());
                observability::SESSION_CANCELLATIONS.click();
                return Ok(message);
            }
            _ = gate.nudged() => {
                if !gate.is_paused() && withheld {
                    let _ = live.send(message.clone());
                    withheld = false;
                }
            }
            next = stream.next() => match next {
                Some(Ok(chunk)) => {
                    if let Some(fragment) = chunk.content_fragment() {
                        observability::STREAM_FRAGMENTS.click();
                        message.push_fragment(fragment);
                        // The gate is read as the fragment is applied, not
                        // captured at session start.
                        if gate.is_paused() {
                            withheld = true;
                        } else {
                            let _ = live.send(message.clone());
                            withheld = false;
                        }
                    }
                }
                Some(Err(err)) => {
                    return Err(err);
                }
                None => {
                    // Clean close: flush anything withheld and settle.
                    let _ = live.send(message.clone());
                    return Ok(message);
                }
            },
        }
    }
}
