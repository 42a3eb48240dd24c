//! Lyric approval and the handoff to audio production.

mod service;

pub use service::{production_metadata, style_prompt, ApprovalService};
