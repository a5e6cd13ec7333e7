//! Value types shared across the client: conversation turns, model
//! identifiers, and the wire format of the completions endpoint.

mod completion;
mod message;
mod model;

pub use completion::{
    ChunkChoice, ChunkDelta, CompletionChunk, CompletionRequest, WireMessage,
};
pub use message::{ChatMessage, Role};
pub use model::{KnownModel, Model};
