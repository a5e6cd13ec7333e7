use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::Model;

/// Author of a conversational turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system turn that frames the conversation.
    System,

    /// A turn authored by the person chatting.
    Human,

    /// A turn produced by the model.
    Assistant,
}

/// One turn in a conversation.
///
/// A message's `id` is assigned at construction and never changes; every
/// intermediate emission of a streaming reply and its terminal form share
/// one id, so consumers can treat successive snapshots as updates-in-place.
/// Identity, equality, and hashing all go by `id`, not content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Opaque unique identifier, stable for the lifetime of the turn.
    pub id: String,

    /// The author of the turn.
    pub role: Role,

    /// The text of the turn. Grows monotonically while streaming and is
    /// frozen once the turn settles.
    pub text: String,

    /// The model that produced an assistant turn; absent otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,

    /// When the turn was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

impl ChatMessage {
    fn new(role: Role, text: String, model: Option<Model>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text,
            model,
            created: OffsetDateTime::now_utc(),
        }
    }

    /// Creates a system turn with the given text.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text.into(), None)
    }

    /// Creates a human turn with the given text.
    pub fn human(text: impl Into<String>) -> Self {
        Self::new(Role::Human, text.into(), None)
    }

    /// Creates an empty assistant turn attributed to `model`.
    ///
    /// This is the shape a streaming reply starts in; the session controller
    /// grows `text` as fragments arrive.
    pub fn assistant(model: Model) -> Self {
        Self::new(Role::Assistant, String::new(), Some(model))
    }

    /// Creates an assistant turn with text already present.
    pub fn assistant_with_text(model: Model, text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text.into(), Some(model))
    }

    /// Returns true if this is a system turn.
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Returns true if this is an assistant turn.
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Appends a streamed fragment to the text.
    ///
    /// Only the session controller's update path may mutate a message; all
    /// other components hold read-only snapshots.
    pub(crate) fn push_fragment(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatMessage {}

impl Hash for ChatMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn role_specific_constructors() {
        let human = ChatMessage::human("hello");
        assert_eq!(human.role, Role::Human);
        assert_eq!(human.text, "hello");
        assert!(human.model.is_none());

        let system = ChatMessage::system("be terse");
        assert!(system.is_system());
        assert!(system.model.is_none());

        let assistant = ChatMessage::assistant(Model::Known(KnownModel::Gpt35Turbo));
        assert!(assistant.is_assistant());
        assert!(assistant.text.is_empty());
        assert_eq!(assistant.model, Some(Model::Known(KnownModel::Gpt35Turbo)));
    }

    #[test]
    fn ids_are_unique() {
        let a = ChatMessage::human("same text");
        let b = ChatMessage::human("same text");
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn equality_is_by_id_not_content() {
        let mut a = ChatMessage::assistant(Model::Known(KnownModel::Gpt35Turbo));
        let b = a.clone();
        a.push_fragment("an update in place");
        assert_eq!(a, b);
        assert_eq!(a.id, b.id);
        assert_ne!(a.text, b.text);
    }

    #[test]
    fn fragments_grow_text_monotonically() {
        let mut msg = ChatMessage::assistant(Model::Known(KnownModel::Gpt4));
        msg.push_fragment("Hello");
        msg.push_fragment(", ");
        msg.push_fragment("world");
        assert_eq!(msg.text, "Hello, world");
    }

    #[test]
    fn serde_round_trip() {
        let msg = ChatMessage::assistant_with_text(Model::Known(KnownModel::Gpt4), "hi");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.text, "hi");
        assert_eq!(back.model, Some(Model::Known(KnownModel::Gpt4)));
    }
}
