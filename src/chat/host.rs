//! Core chat session hosting.
//!
//! This module provides the `ChatHost` struct which owns conversation
//! state and the lifecycle of the one active streaming session.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::accounting::{self, TokenEstimate};
use crate::chat::config::ChatConfig;
use crate::client::OpenAi;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::session::{PauseGate, SessionOptions, StreamSession};
use crate::types::{ChatMessage, Model};

/// How often the streaming loop polls the external interrupt flag.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A chat host that owns conversation state and session lifecycles.
///
/// The host is the single writer of the message list and of the active
/// session slot: at most one session is in flight at a time, and starting
/// another while one is unsettled is a caller error rather than an implicit
/// cancellation. The pause gate is created once here and passed by
/// reference into every session, so pause state stays consistent across
/// re-subscription and re-render.
pub struct ChatHost {
    client: OpenAi,
    config: ChatConfig,
    messages: Vec<ChatMessage>,
    pause_gate: Arc<PauseGate>,
    in_flight: bool,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: Model,
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// The maximum tokens per response, if capped.
    pub max_tokens: Option<u32>,
    /// The sampling temperature, if set.
    pub temperature: Option<f32>,
    /// The system prompt, if any.
    pub system_prompt: Option<String>,
    /// Estimated token count for the conversation.
    pub estimated_tokens: usize,
    /// Estimated cost in USD, when pricing is known.
    pub estimated_cost: Option<f64>,
}

impl ChatHost {
    /// Creates a new chat host with the given client and configuration.
    pub fn new(client: OpenAi, config: ChatConfig) -> Self {
        Self {
            client,
            config,
            messages: Vec::new(),
            pause_gate: Arc::new(PauseGate::new()),
            in_flight: false,
        }
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Adds the user message to history
    /// 2. Starts a streaming session over the full history
    /// 3. Renders response fragments as they become observable
    /// 4. Adds the terminal assistant message to history
    ///
    /// A cancelled session is a success: the partial reply (with its
    /// truncation marker) joins the history like any other. On error the
    /// user message is rolled back, the classified failure goes to the
    /// renderer, and the error is returned for the caller's own handling.
    ///
    /// # Errors
    ///
    /// Returns an error if a session is already in flight, or if the
    /// request fails.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        interrupted: Arc<AtomicBool>,
    ) -> Result<()> {
        if self.in_flight {
            return Err(Error::validation(
                "a streaming session is already in flight; settle it before starting another",
                Some("session".to_string()),
            ));
        }

        let previous_len = self.messages.len();
        self.messages.push(ChatMessage::human(user_input));

        self.in_flight = true;
        let outcome = self.stream_turn(renderer, interrupted).await;
        self.in_flight = false;
        // Pause never outlives the session that observed it.
        self.pause_gate.resume();

        match outcome {
            Ok(message) => {
                renderer.finish_response();
                self.messages.push(message);
                Ok(())
            }
            Err(err) => {
                self.messages.truncate(previous_len);
                renderer.print_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Drives one session to its terminal outcome, rendering observable
    /// snapshots as deltas and translating the interrupt flag into
    /// cancellation.
    async fn stream_turn(
        &mut self,
        renderer: &mut dyn Renderer,
        interrupted: Arc<AtomicBool>,
    ) -> Result<ChatMessage> {
        let options = SessionOptions::new(self.config.model.clone())
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_system_prompt(self.config.system_prompt.clone());

        let handle = StreamSession::start(
            &self.client,
            &self.messages,
            options,
            Arc::clone(&self.pause_gate),
        )
        .await?;

        let canceller = handle.canceller();
        let mut live = handle.subscribe();
        let mut live_open = true;
        // Byte offset of what has been rendered; snapshots only ever grow.
        let mut printed = 0;
        let mut ticker = tokio::time::interval(INTERRUPT_POLL_INTERVAL);
        let mut join = pin!(handle.join());

        loop {
            tokio::select! {
                outcome = &mut join => {
                    let message = outcome?;
                    if message.text.len() > printed {
                        renderer.print_text(&message.text[printed..]);
                    }
                    return Ok(message);
                }
                changed = live.changed(), if live_open => {
                    if changed.is_ok() {
                        let text = live.borrow_and_update().text.clone();
                        if text.len() > printed {
                            renderer.print_text(&text[printed..]);
                            printed = text.len();
                        }
                    } else {
                        live_open = false;
                    }
                }
                _ = ticker.tick() => {
                    if interrupted.swap(false, Ordering::Relaxed) {
                        canceller.cancel();
                        renderer.print_interrupted();
                    }
                }
            }
        }
    }

    /// Estimates tokens and cost for the current conversation.
    pub fn token_info(&self) -> TokenEstimate {
        accounting::estimate(&self.messages, &self.config.model)
    }

    /// Suppresses rendering of incoming fragments for the active session.
    pub fn pause(&self) {
        self.pause_gate.pause();
    }

    /// Resumes rendering; everything buffered while paused appears as one
    /// update.
    pub fn resume(&self) {
        self.pause_gate.resume();
    }

    /// Flips the pause state and returns the new value.
    pub fn toggle_pause(&self) -> bool {
        self.pause_gate.toggle()
    }

    /// Returns the pause state shared with the active session.
    pub fn is_paused(&self) -> bool {
        self.pause_gate.is_paused()
    }

    /// Returns the gate shared with every session this host starts.
    pub fn pause_gate(&self) -> Arc<PauseGate> {
        Arc::clone(&self.pause_gate)
    }

    /// Clears the conversation history.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Returns the conversation history.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Changes the model used for responses.
    pub fn set_model(&mut self, model: Model) {
        self.config.model = model;
    }

    /// Returns the current model.
    pub fn model(&self) -> &Model {
        &self.config.model
    }

    /// Sets or clears the system prompt.
    pub fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.config.system_prompt = prompt;
    }

    /// Returns the current system prompt, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.config.system_prompt.as_deref()
    }

    /// Sets or clears the maximum tokens per response.
    pub fn set_max_tokens(&mut self, max_tokens: Option<u32>) {
        self.config.max_tokens = max_tokens;
    }

    /// Sets or clears the sampling temperature.
    pub fn set_temperature(&mut self, temperature: Option<f32>) {
        self.config.temperature = temperature;
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let estimate = self.token_info();
        SessionStats {
            model: self.config.model.clone(),
            message_count: self.message_count(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system_prompt: self.config.system_prompt.clone(),
            estimated_tokens: estimate.count,
            estimated_cost: estimate.cost,
        }
    }
}
