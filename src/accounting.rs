//! Token and cost estimation for conversations.
//!
//! Estimates here are pre-flight figures, not billing truth: the count
//! follows the upstream service's counting convention closely enough to be
//! trustworthy, and the cost is derived from a static pricing table. Both
//! are recomputed on demand; nothing is persisted.

use crate::observability;
use crate::types::{ChatMessage, Model};

/// Fixed per-message overhead covering role annotation and separators in
/// the upstream counting convention.
const TOKENS_PER_MESSAGE: usize = 4;

/// A derived usage figure for a conversation.
///
/// `cost` is `None` when the model's pricing is unknown, which must never
/// be read as free.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimate {
    /// Estimated token count for the conversation.
    pub count: usize,

    /// Estimated cost in USD, when the model's pricing is known.
    pub cost: Option<f64>,
}

/// Estimates tokens and cost for `messages` as a prompt to `model`.
///
/// Pure and deterministic; safe to call at any time, including while a
/// session is streaming. An empty conversation estimates to zero tokens.
/// Unknown pricing yields `cost = None` plus a non-fatal diagnostic.
pub fn estimate(messages: &[ChatMessage], model: &Model) -> TokenEstimate {
    let count: usize = messages
        .iter()
        .map(|message| TOKENS_PER_MESSAGE + estimate_tokens(&message.text))
        .sum();

    let cost = match model.price_per_1k_tokens() {
        Some(price) => Some(count as f64 / 1000.0 * price),
        None => {
            observability::UNKNOWN_MODEL_PRICING.click();
            None
        }
    };

    TokenEstimate { count, cost }
}

/// Estimates the number of tokens in a text.
///
/// A blend of character- and word-based heuristics: English averages about
/// four characters per token and about 1.33 tokens per word. The blend
/// tracks the upstream tokenizer well enough for pre-flight estimates.
fn estimate_tokens(text: &str) -> usize {
    let char_count = text.chars().count();
    let word_count = text.split_whitespace().count();

    let char_estimate = char_count / 4;
    let word_estimate = (word_count as f64 * 1.33) as usize;

    (char_estimate + word_estimate) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::human("Explain the borrow checker in one paragraph."),
            ChatMessage::assistant_with_text(
                Model::Known(KnownModel::Gpt35Turbo),
                "The borrow checker enforces aliasing and lifetime rules at compile time.",
            ),
        ]
    }

    #[test]
    fn empty_conversation_is_zero_tokens() {
        let est = estimate(&[], &Model::Known(KnownModel::Gpt35Turbo));
        assert_eq!(est.count, 0);
        assert_eq!(est.cost, Some(0.0));
    }

    #[test]
    fn estimate_is_deterministic() {
        let messages = conversation();
        let model = Model::Known(KnownModel::Gpt4);
        let a = estimate(&messages, &model);
        let b = estimate(&messages, &model);
        assert_eq!(a, b);
    }

    #[test]
    fn known_pricing_scales_with_count() {
        let messages = conversation();
        let est = estimate(&messages, &Model::Known(KnownModel::Gpt35Turbo));
        assert!(est.count > 0);
        let cost = est.cost.expect("gpt-3.5-turbo pricing is known");
        let expected = est.count as f64 / 1000.0 * 0.002;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn unknown_pricing_is_absent_not_zero() {
        let messages = conversation();
        let est = estimate(&messages, &Model::Custom("unknown-model-x".to_string()));
        assert!(est.count > 0);
        assert_eq!(est.cost, None);
    }

    #[test]
    fn longer_conversations_cost_more() {
        let mut messages = conversation();
        let model = Model::Known(KnownModel::Gpt4);
        let short = estimate(&messages, &model);
        messages.push(ChatMessage::human(
            "Now explain lifetimes, variance, and higher-ranked trait bounds in depth.",
        ));
        let long = estimate(&messages, &model);
        assert!(long.count > short.count);
        assert!(long.cost.unwrap() > short.cost.unwrap());
    }

    #[test]
    fn token_heuristic_tracks_text_length() {
        assert_eq!(estimate_tokens(""), 0);
        let short = estimate_tokens("A short sentence.");
        let long = estimate_tokens(
            "A considerably longer sentence that should estimate to many more tokens \
             than the short one does.",
        );
        assert!(long > short);
    }
}
