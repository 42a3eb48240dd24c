//! The lyric generation pipeline.
//!
//! Correctness under concurrent calls for the same order rests on the store:
//! both callers may reach the provider, but only one lyric pair can be
//! persisted and the loser reports [`GenerationOutcome::AlreadyGenerated`].
//! A loser that only notices once the order has moved past `LyricsPending`
//! reports the same.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::prompt::build_messages;
use super::splitter::{parse_draft, split_drafts};
use crate::events::{EventHandle, OrderEvent};
use crate::generation::{CompletionRequest, GenerationConfig, GenerationProvider, ProviderError};
use crate::metrics;
use crate::moderation::ContentModerator;
use crate::notify::NotificationDispatcher;
use crate::order::{
    announce_transition, Lyric, LyricDraft, OrderError, OrderStore, OrderTrigger,
};

/// Errors returned by [`LyricsPipeline::generate_lyrics`].
///
/// None of them leaves lyric rows behind.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The story contains disallowed terms. No provider call was made.
    #[error("Content rejected for order {order_id}, disallowed terms: {}", .terms.join(", "))]
    ContentRejected {
        order_id: String,
        terms: Vec<String>,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The provider text could not be split into two drafts.
    #[error("Malformed provider output: {0}")]
    MalformedOutput(String),

    #[error(transparent)]
    Order(#[from] OrderError),
}

impl PipelineError {
    /// Whether calling again later (by a caller or the recovery sweep) can succeed
    /// without the order being edited.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Provider(_) | PipelineError::MalformedOutput(_) => true,
            PipelineError::Order(OrderError::Database(_)) => true,
            _ => false,
        }
    }
}

/// Successful result of a generation request.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// This call produced and stored the lyric pair.
    Generated { lyrics: Vec<Lyric> },
    /// Lyrics already existed, or a concurrent call stored them first.
    AlreadyGenerated,
}

impl GenerationOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, GenerationOutcome::Generated { .. })
    }
}

/// Moderation, provider call, splitting and persistence for one order.
pub struct LyricsPipeline {
    store: Arc<dyn OrderStore>,
    provider: Arc<dyn GenerationProvider>,
    moderator: Arc<ContentModerator>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    events: Option<EventHandle>,
    notifier: Option<Arc<NotificationDispatcher>>,
}

impl LyricsPipeline {
    pub fn new(
        store: Arc<dyn OrderStore>,
        provider: Arc<dyn GenerationProvider>,
        moderator: Arc<ContentModerator>,
    ) -> Self {
        Self {
            store,
            provider,
            moderator,
            temperature: None,
            max_tokens: None,
            events: None,
            notifier: None,
        }
    }

    /// Use the sampling settings of a generation config.
    pub fn with_sampling(mut self, config: &GenerationConfig) -> Self {
        self.temperature = Some(config.temperature);
        self.max_tokens = Some(config.max_tokens);
        self
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<NotificationDispatcher>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Generate and store the two lyric drafts of an order.
    ///
    /// Idempotent: an order that already has lyrics returns
    /// [`GenerationOutcome::AlreadyGenerated`] without calling the provider.
    /// Never retries on its own.
    pub async fn generate_lyrics(&self, order_id: &str) -> Result<GenerationOutcome, PipelineError> {
        let start = Instant::now();
        let result = self.run(order_id).await;

        let label = match &result {
            Ok(GenerationOutcome::Generated { .. }) => "generated",
            Ok(GenerationOutcome::AlreadyGenerated) => "already_generated",
            Err(PipelineError::ContentRejected { .. }) => "rejected",
            Err(_) => "failed",
        };
        metrics::LYRIC_GENERATIONS_TOTAL
            .with_label_values(&[label])
            .inc();
        metrics::LYRIC_GENERATION_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        if let Err(ref e) = result {
            if !matches!(e, PipelineError::ContentRejected { .. } | PipelineError::NotFound(_)) {
                error!(order_id = %order_id, error = %e, retryable = e.is_retryable(), "Lyric generation failed");
                self.emit(OrderEvent::LyricsGenerationFailed {
                    order_id: order_id.to_string(),
                    error: e.to_string(),
                    retryable: e.is_retryable(),
                })
                .await;
            }
        }

        result
    }

    async fn run(&self, order_id: &str) -> Result<GenerationOutcome, PipelineError> {
        if order_id.trim().is_empty() {
            return Err(PipelineError::Validation("order_id is required".to_string()));
        }

        let order = self
            .store
            .get(order_id)?
            .ok_or_else(|| PipelineError::NotFound(order_id.to_string()))?;

        if self.store.lyric_count(order_id)? > 0 {
            debug!(order_id = %order_id, "Lyrics already exist, skipping generation");
            return Ok(GenerationOutcome::AlreadyGenerated);
        }

        let messages = build_messages(&order);

        let terms = self.moderator.scan(&order.story);
        if !terms.is_empty() {
            metrics::MODERATION_REJECTIONS_TOTAL.inc();
            warn!(order_id = %order_id, terms = ?terms, "Story rejected by moderation");
            self.emit(OrderEvent::ContentRejected {
                order_id: order_id.to_string(),
                terms: terms.clone(),
            })
            .await;
            return Err(PipelineError::ContentRejected {
                order_id: order_id.to_string(),
                terms,
            });
        }

        let started = match self
            .store
            .apply_trigger(order_id, OrderTrigger::GenerationStarted)
        {
            Ok(started) => started,
            // A concurrent call may have stored the pair since the count above.
            Err(e @ OrderError::InvalidTransition { .. }) => {
                if self.store.lyric_count(order_id)? > 0 {
                    info!(order_id = %order_id, "Concurrent generation stored lyrics first");
                    return Ok(GenerationOutcome::AlreadyGenerated);
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        announce_transition(self.events.as_ref(), self.notifier.as_ref(), &started).await;

        let mut request = CompletionRequest::new(messages);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let provider_start = Instant::now();
        let completion = self.provider.complete(request).await?;
        let provider_ms = provider_start.elapsed().as_millis() as u64;

        let [first, second] = split_drafts(&completion.text).ok_or_else(|| {
            PipelineError::MalformedOutput(
                "could not split provider output into two drafts".to_string(),
            )
        })?;
        let drafts: [LyricDraft; 2] = [parse_draft(&first), parse_draft(&second)];

        let saved = match self.store.save_lyric_pair(order_id, &drafts) {
            Ok(saved) => saved,
            Err(OrderError::DuplicateLyrics(_)) => {
                info!(order_id = %order_id, "Concurrent generation stored lyrics first, discarding output");
                return Ok(GenerationOutcome::AlreadyGenerated);
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            order_id = %order_id,
            protocol = %completion.protocol,
            provider_ms,
            "Lyrics generated"
        );

        self.emit(OrderEvent::LyricsGenerated {
            order_id: order_id.to_string(),
            lyric_ids: saved.lyrics.iter().map(|l| l.id.clone()).collect(),
            protocol: completion.protocol.as_str().to_string(),
            duration_ms: provider_ms,
        })
        .await;
        announce_transition(
            self.events.as_ref(),
            self.notifier.as_ref(),
            &saved.transition,
        )
        .await;

        Ok(GenerationOutcome::Generated {
            lyrics: saved.lyrics,
        })
    }

    async fn emit(&self, event: OrderEvent) {
        if let Some(ref events) = self.events {
            events.emit(event).await;
        }
    }
}
