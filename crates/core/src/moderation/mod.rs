//! Content moderation for customer-supplied text.

mod config;
mod moderator;

pub use config::ModerationConfig;
pub use moderator::ContentModerator;
