use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::RecoveryConfig;
use crate::events::{EventHandle, OrderEvent};
use crate::lyrics::{GenerationOutcome, LyricsPipeline};
use crate::metrics;
use crate::order::{OrderError, OrderStore};

/// What happened to one order during a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SweepResult {
    /// Lyrics were generated by this sweep.
    Repaired,
    /// Lyrics appeared concurrently; nothing to do.
    Skipped,
    Failed { error: String, retryable: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub order_id: String,
    #[serde(flatten)]
    pub result: SweepResult,
}

impl SweepOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.result, SweepResult::Failed { .. })
    }
}

/// Per-order outcomes and totals of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<SweepOutcome>,
}

/// Finds paid orders without lyrics and runs the pipeline for each.
pub struct RecoverySweep {
    config: RecoveryConfig,
    store: Arc<dyn OrderStore>,
    pipeline: Arc<LyricsPipeline>,
    events: Option<EventHandle>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RecoverySweep {
    pub fn new(
        config: RecoveryConfig,
        store: Arc<dyn OrderStore>,
        pipeline: Arc<LyricsPipeline>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            store,
            pipeline,
            events: None,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run one sweep now.
    ///
    /// Orders are processed one at a time. A failing order is recorded and the
    /// sweep moves on; only failing to list candidates aborts it.
    pub async fn sweep(&self) -> Result<SweepReport, OrderError> {
        Self::sweep_once(
            &self.store,
            &self.pipeline,
            self.events.as_ref(),
            self.config.batch_limit,
        )
        .await
    }

    async fn sweep_once(
        store: &Arc<dyn OrderStore>,
        pipeline: &Arc<LyricsPipeline>,
        events: Option<&EventHandle>,
        batch_limit: i64,
    ) -> Result<SweepReport, OrderError> {
        metrics::RECOVERY_SWEEPS_TOTAL.inc();

        let orders = store.list_paid_without_lyrics(batch_limit)?;
        if orders.is_empty() {
            debug!("Recovery sweep found no orders to repair");
        } else {
            info!(count = orders.len(), "Recovery sweep starting");
        }

        let mut report = SweepReport {
            examined: orders.len(),
            ..Default::default()
        };

        for order in orders {
            let result = match pipeline.generate_lyrics(&order.id).await {
                Ok(GenerationOutcome::Generated { .. }) => SweepResult::Repaired,
                Ok(GenerationOutcome::AlreadyGenerated) => SweepResult::Skipped,
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Recovery failed for order");
                    SweepResult::Failed {
                        error: e.to_string(),
                        retryable: e.is_retryable(),
                    }
                }
            };

            let label = match result {
                SweepResult::Repaired => "repaired",
                SweepResult::Skipped => "skipped",
                SweepResult::Failed { .. } => "failed",
            };
            metrics::RECOVERY_ORDERS_TOTAL
                .with_label_values(&[label])
                .inc();

            let outcome = SweepOutcome {
                order_id: order.id,
                result,
            };
            if outcome.is_success() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            report.outcomes.push(outcome);
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                succeeded = report.succeeded,
                failed = report.failed,
                "Recovery sweep completed"
            );
        }

        if let Some(events) = events {
            events
                .emit(OrderEvent::RecoverySweepCompleted {
                    examined: report.examined,
                    succeeded: report.succeeded,
                    failed: report.failed,
                })
                .await;
        }

        Ok(report)
    }

    /// Start the background loop. A no-op when already running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Recovery loop already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        let events = self.events.clone();
        let interval = self.config.interval();
        let batch_limit = self.config.batch_limit;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Recovery loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Recovery loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = Self::sweep_once(&store, &pipeline, events.as_ref(), batch_limit).await {
                            error!(error = %e, "Recovery sweep failed");
                        }
                    }
                }
            }
            info!("Recovery loop stopped");
        });
    }

    /// Signal the background loop to stop. A sweep in progress finishes its
    /// current order first.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Recovery loop not running");
            return;
        }
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::moderation::{ContentModerator, ModerationConfig};
    use crate::order::{OrderStatus, SqliteOrderStore};
    use crate::testing::{fixtures, MockProvider};

    fn setup(provider: MockProvider) -> (Arc<SqliteOrderStore>, Arc<MockProvider>, RecoverySweep) {
        let store = Arc::new(SqliteOrderStore::in_memory().unwrap());
        let provider = Arc::new(provider);
        let pipeline = Arc::new(LyricsPipeline::new(
            store.clone(),
            provider.clone(),
            Arc::new(ContentModerator::new(&ModerationConfig::default())),
        ));
        let sweep = RecoverySweep::new(RecoveryConfig::default(), store.clone(), pipeline);
        (store, provider, sweep)
    }

    #[tokio::test]
    async fn test_sweep_repairs_paid_orders_once() {
        let (store, provider, sweep) = setup(MockProvider::with_text(fixtures::TWO_DRAFTS));
        let a = fixtures::paid_order(store.as_ref(), "user-1");
        let b = fixtures::paid_order(store.as_ref(), "user-2");
        let unpaid = store.create(fixtures::order_request("user-3")).unwrap();

        let first = sweep.sweep().await.unwrap();
        assert_eq!(first.examined, 2);
        assert_eq!(first.succeeded, 2);
        assert!(first
            .outcomes
            .iter()
            .all(|o| o.result == SweepResult::Repaired));

        let second = sweep.sweep().await.unwrap();
        assert_eq!(second.examined, 0);
        assert_eq!(provider.call_count(), 2);

        for order in [&a, &b] {
            assert_eq!(store.lyric_count(&order.id).unwrap(), 2);
        }
        assert_eq!(store.lyric_count(&unpaid.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_sweep() {
        let (store, provider, sweep) = setup(MockProvider::with_text(fixtures::TWO_DRAFTS));
        let rejected = fixtures::paid_order_with_story(store.as_ref(), "user-1", "kill yourself");
        let good = fixtures::paid_order(store.as_ref(), "user-2");

        let report = sweep.sweep().await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        let failed = report
            .outcomes
            .iter()
            .find(|o| o.order_id == rejected.id)
            .unwrap();
        assert!(matches!(
            failed.result,
            SweepResult::Failed { retryable: false, .. }
        ));
        assert_eq!(store.lyric_count(&good.id).unwrap(), 2);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_retried_by_next_sweep() {
        let (store, provider, sweep) = setup(MockProvider::failing());
        let order = fixtures::paid_order(store.as_ref(), "user-1");

        let first = sweep.sweep().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(
            store.get(&order.id).unwrap().unwrap().status,
            OrderStatus::LyricsPending
        );

        provider.set_text(fixtures::TWO_DRAFTS);
        let second = sweep.sweep().await.unwrap();
        assert_eq!(second.succeeded, 1);
        assert_eq!(
            store.get(&order.id).unwrap().unwrap().status,
            OrderStatus::LyricsGenerated
        );
    }

    #[tokio::test]
    async fn test_outcome_serializes_flat() {
        let outcome = SweepOutcome {
            order_id: "o-1".to_string(),
            result: SweepResult::Failed {
                error: "boom".to_string(),
                retryable: true,
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["order_id"], "o-1");
        assert_eq!(json["result"], "failed");
        assert_eq!(json["retryable"], true);
    }

    #[tokio::test]
    async fn test_background_loop_runs_and_stops() {
        let store = Arc::new(SqliteOrderStore::in_memory().unwrap());
        let provider = Arc::new(MockProvider::with_text(fixtures::TWO_DRAFTS));
        let pipeline = Arc::new(LyricsPipeline::new(
            store.clone(),
            provider.clone(),
            Arc::new(ContentModerator::new(&ModerationConfig::default())),
        ));
        let config = RecoveryConfig {
            interval_secs: 0,
            ..Default::default()
        };
        let sweep = RecoverySweep::new(config, store.clone(), pipeline);
        let order = fixtures::paid_order(store.as_ref(), "user-1");

        sweep.start();
        assert!(sweep.is_running());

        for _ in 0..50 {
            if store.lyric_count(&order.id).unwrap() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.lyric_count(&order.id).unwrap(), 2);

        sweep.stop();
        assert!(!sweep.is_running());
    }
}
