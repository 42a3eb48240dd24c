//! Lyric generation: prompt construction, draft splitting and the pipeline
//! that ties moderation, the provider and persistence together.

mod pipeline;
mod prompt;
mod splitter;

pub use pipeline::{GenerationOutcome, LyricsPipeline, PipelineError};
pub use prompt::{build_messages, SYSTEM_PROMPT};
pub use splitter::{extract_title, parse_draft, split_drafts, DEFAULT_TITLE};
