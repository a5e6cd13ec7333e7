//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use arrrg_derive::CommandLine;

use crate::types::{KnownModel, Model};

/// Default sampling temperature; chat exchanges want determinism.
const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Command-line arguments for the colloquy-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gpt-3.5-turbo)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: unlimited)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Base URL of an OpenAI-compatible endpoint.
    #[arrrg(optional, "Base URL of the completions API", "URL")]
    pub base_url: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// The model to use for generating responses.
    pub model: Model,

    /// Optional system prompt to set conversation context.
    pub system_prompt: Option<String>,

    /// Maximum tokens per response; `None` defers to the service default.
    pub max_tokens: Option<u32>,

    /// Sampling temperature; `None` defers to the service default.
    pub temperature: Option<f32>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Base URL override for self-hosted or proxied endpoints.
    pub base_url: Option<String>,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-3.5-turbo
    /// - Temperature: 0.0
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: Model::Known(KnownModel::Gpt35Turbo),
            system_prompt: None,
            max_tokens: None,
            temperature: Some(DEFAULT_TEMPERATURE),
            use_color: true,
            base_url: None,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the base URL override.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let model = args
            .model
            .map(|s| Model::from(s.as_str()))
            .unwrap_or(Model::Known(KnownModel::Gpt35Turbo));

        ChatConfig {
            model,
            system_prompt: args.system,
            max_tokens: args.max_tokens,
            use_color: !args.no_color,
            base_url: args.base_url,
            ..ChatConfig::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.model, Model::Known(KnownModel::Gpt35Turbo));
        assert!(config.system_prompt.is_none());
        assert!(config.max_tokens.is_none());
        assert_eq!(config.temperature, Some(0.0));
        assert!(config.use_color);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn config_from_args_defaults() {
        let args = ChatArgs::default();
        let config = ChatConfig::from(args);
        assert_eq!(config.model, Model::Known(KnownModel::Gpt35Turbo));
        assert_eq!(config.temperature, Some(0.0));
        assert!(config.use_color);
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("gpt-4".to_string()),
            system: Some("You are helpful.".to_string()),
            max_tokens: Some(512),
            base_url: Some("https://proxy.example.com/v1/".to_string()),
            no_color: true,
        };
        let config = ChatConfig::from(args);
        assert_eq!(config.model, Model::Known(KnownModel::Gpt4));
        assert_eq!(config.system_prompt, Some("You are helpful.".to_string()));
        assert_eq!(config.max_tokens, Some(512));
        assert_eq!(
            config.base_url,
            Some("https://proxy.example.com/v1/".to_string())
        );
        assert!(!config.use_color);
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_model(Model::Known(KnownModel::Gpt4))
            .with_system_prompt("Test prompt".to_string())
            .with_max_tokens(Some(2048))
            .with_temperature(Some(0.6))
            .without_color()
            .with_base_url(Some("https://example.com/v1/".to_string()));

        assert_eq!(config.model, Model::Known(KnownModel::Gpt4));
        assert_eq!(config.system_prompt, Some("Test prompt".to_string()));
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(config.temperature, Some(0.6));
        assert!(!config.use_color);
        assert_eq!(config.base_url, Some("https://example.com/v1/".to_string()));
    }
}
