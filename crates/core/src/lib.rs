pub mod approval;
pub mod config;
pub mod events;
pub mod generation;
pub mod lyrics;
pub mod metrics;
pub mod moderation;
pub mod notify;
pub mod order;
pub mod recovery;
pub mod testing;

pub use approval::ApprovalService;
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use events::{create_event_log, EventHandle, EventWriter, OrderEvent, SqliteEventStore};
pub use generation::{GenerationProvider, OpenAiCompatibleProvider, ProviderError};
pub use lyrics::{GenerationOutcome, LyricsPipeline, PipelineError};
pub use moderation::ContentModerator;
pub use notify::NotificationDispatcher;
pub use order::{
    Order, OrderError, OrderService, OrderStatus, OrderStore, OrderTrigger, SqliteOrderStore,
};
pub use recovery::{RecoverySweep, SweepReport};
