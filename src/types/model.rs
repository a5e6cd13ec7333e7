use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents a completion model identifier.
///
/// This can be a predefined model version or a custom string value for
/// models that may be added in the future or served by compatible gateways.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier (for future models or self-hosted gateways)
    Custom(String),
}

/// Known model versions served by the chat completions endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// GPT-4
    #[serde(rename = "gpt-4")]
    Gpt4,

    /// GPT-4 Turbo
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,

    /// GPT-4o
    #[serde(rename = "gpt-4o")]
    Gpt4o,

    /// GPT-3.5 Turbo
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,

    /// GPT-3.5 Turbo with the 16k context window
    #[serde(rename = "gpt-3.5-turbo-16k")]
    Gpt35Turbo16k,
}

impl Model {
    /// Price in USD per 1,000 tokens, when pricing is known.
    ///
    /// `None` means pricing is unknown, which is not the same as free; the
    /// accountant surfaces unknown pricing as an absent cost rather than
    /// zero.
    pub fn price_per_1k_tokens(&self) -> Option<f64> {
        match self {
            Model::Known(KnownModel::Gpt4) => Some(0.06),
            Model::Known(KnownModel::Gpt35Turbo) => Some(0.002),
            Model::Known(_) => None,
            Model::Custom(_) => None,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{}", known_model),
            Model::Custom(custom) => write!(f, "{}", custom),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnownModel::Gpt4 => write!(f, "gpt-4"),
            KnownModel::Gpt4Turbo => write!(f, "gpt-4-turbo"),
            KnownModel::Gpt4o => write!(f, "gpt-4o"),
            KnownModel::Gpt35Turbo => write!(f, "gpt-3.5-turbo"),
            KnownModel::Gpt35Turbo16k => write!(f, "gpt-3.5-turbo-16k"),
        }
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        Model::from(model.as_str())
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        match model {
            "gpt-4" => Model::Known(KnownModel::Gpt4),
            "gpt-4-turbo" => Model::Known(KnownModel::Gpt4Turbo),
            "gpt-4o" => Model::Known(KnownModel::Gpt4o),
            "gpt-3.5-turbo" => Model::Known(KnownModel::Gpt35Turbo),
            "gpt-3.5-turbo-16k" => Model::Known(KnownModel::Gpt35Turbo16k),
            other => Model::Custom(other.to_string()),
        }
    }
}
