//! Remote collaborators for invroll.
//!
//! This crate provides the network-facing implementations of the core
//! traits:
//! - [`ChatNormalizer`]: an OpenAI-compatible chat model as a
//!   [`Normalizer`](invroll_core::Normalizer), with pacing and backoff
//! - [`RestStore`]: a PostgREST endpoint as a
//!   [`RecordStore`](invroll_core::RecordStore)

pub mod backend;
mod error;
mod normalizer;
mod pacing;
mod rest_store;
mod retry;

pub use backend::chat::HttpChatTransport;
pub use backend::{ChatMessage, ChatRequest, ChatTransport};
pub use error::RemoteError;
pub use normalizer::ChatNormalizer;
pub use pacing::PacingGate;
pub use rest_store::RestStore;
pub use retry::RetryPolicy;

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
