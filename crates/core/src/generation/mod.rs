//! Text generation provider boundary.
//!
//! [`GenerationProvider`] is the seam the lyric pipeline calls through.
//! [`OpenAiCompatibleProvider`] speaks the chat-completions protocol and falls
//! back to the responses protocol once when the primary call fails.

mod config;
mod openai;
mod provider;

pub use config::GenerationConfig;
pub use openai::OpenAiCompatibleProvider;
pub use provider::{
    ChatMessage, Completion, CompletionRequest, GenerationProvider, Protocol, ProviderError,
};
