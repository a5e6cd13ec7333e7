// Public modules
pub mod accounting;
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod render;
pub mod session;
pub mod types;

// Re-exports
pub use accounting::{TokenEstimate, estimate};
pub use client::OpenAi;
pub use error::{Error, Result};
pub use session::{
    PauseGate, SessionHandle, SessionOptions, StreamSession, TRUNCATION_MARKER,
};
pub use types::*;
