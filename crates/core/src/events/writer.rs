use std::sync::Arc;

use tokio::sync::mpsc;

use super::{EventEnvelope, EventHandle, EventRecord, EventStore};
use crate::metrics::{EVENTS_DROPPED_TOTAL, EVENTS_WRITTEN_TOTAL};

/// Most envelopes appended in one transaction.
const MAX_BATCH: usize = 64;

/// Background task that drains emitted events into the store.
///
/// Whatever is queued when the writer wakes up is appended as one batch. If
/// the batch is rejected, its records are retried one by one so a single bad
/// record does not take the rest of the batch with it.
pub struct EventWriter {
    rx: mpsc::Receiver<EventEnvelope>,
    store: Arc<dyn EventStore>,
}

impl EventWriter {
    pub fn new(rx: mpsc::Receiver<EventEnvelope>, store: Arc<dyn EventStore>) -> Self {
        Self { rx, store }
    }

    /// Run until every [`EventHandle`] has been dropped.
    ///
    /// Spawn with `tokio::spawn(writer.run())`.
    pub async fn run(mut self) {
        tracing::info!("Event writer started");

        let mut envelopes = Vec::with_capacity(MAX_BATCH);
        let mut written = 0usize;
        let mut dropped = 0usize;

        while self.rx.recv_many(&mut envelopes, MAX_BATCH).await > 0 {
            let records: Vec<EventRecord> = envelopes
                .drain(..)
                .map(|envelope| EventRecord::new(envelope.timestamp, envelope.event))
                .collect();

            let stored = self.write(&records);
            written += stored;
            dropped += records.len() - stored;
        }

        tracing::info!(written, dropped, "Event writer shutting down");
    }

    /// Append `records`, returning how many reached the store.
    fn write(&self, records: &[EventRecord]) -> usize {
        match self.store.append(records) {
            Ok(()) => {
                records.iter().for_each(count_written);
                records.len()
            }
            Err(e) if records.len() > 1 => {
                tracing::warn!(batch = records.len(), error = %e, "Event batch rejected, appending one by one");
                records
                    .iter()
                    .filter(|record| self.write_one(record))
                    .count()
            }
            Err(e) => {
                count_failed(&records[0], &e);
                0
            }
        }
    }

    fn write_one(&self, record: &EventRecord) -> bool {
        match self.store.append(std::slice::from_ref(record)) {
            Ok(()) => {
                count_written(record);
                true
            }
            Err(e) => {
                count_failed(record, &e);
                false
            }
        }
    }
}

fn count_written(record: &EventRecord) {
    EVENTS_WRITTEN_TOTAL
        .with_label_values(&[record.event_type.as_str()])
        .inc();
}

fn count_failed(record: &EventRecord, error: &super::EventLogError) {
    EVENTS_DROPPED_TOTAL
        .with_label_values(&["insert_failed"])
        .inc();
    tracing::error!(
        event_type = %record.event_type,
        order_id = record.order_id.as_deref().unwrap_or("-"),
        error = %error,
        "Failed to write event"
    );
}

/// Create the event log plumbing
///
/// Returns the handle to clone into components and the writer to spawn.
pub fn create_event_log(
    store: Arc<dyn EventStore>,
    buffer_size: usize,
) -> (EventHandle, EventWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = EventHandle::new(tx);
    let writer = EventWriter::new(rx, store);
    (handle, writer)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::events::{EventFilter, EventLogError, OrderEvent, SqliteEventStore};

    fn paid(order_id: &str) -> OrderEvent {
        OrderEvent::PaymentConfirmed {
            order_id: order_id.to_string(),
        }
    }

    /// SQLite log that refuses any append containing events for one order,
    /// and remembers the size of every append it was asked for.
    struct RefusingOrderStore {
        inner: SqliteEventStore,
        refused_order: String,
        append_sizes: Mutex<Vec<usize>>,
    }

    impl EventStore for RefusingOrderStore {
        fn append(&self, records: &[EventRecord]) -> Result<(), EventLogError> {
            self.append_sizes.lock().unwrap().push(records.len());
            if records
                .iter()
                .any(|r| r.order_id.as_deref() == Some(self.refused_order.as_str()))
            {
                return Err(EventLogError::Database("disk I/O error".to_string()));
            }
            self.inner.append(records)
        }

        fn query(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, EventLogError> {
            self.inner.query(filter)
        }

        fn count(&self, filter: &EventFilter) -> Result<i64, EventLogError> {
            self.inner.count(filter)
        }

        fn order_history(&self, order_id: &str) -> Result<Vec<EventRecord>, EventLogError> {
            self.inner.order_history(order_id)
        }
    }

    #[tokio::test]
    async fn test_queued_events_are_written_as_one_batch_in_order() {
        let store = Arc::new(RefusingOrderStore {
            inner: SqliteEventStore::in_memory().unwrap(),
            refused_order: "none".to_string(),
            append_sizes: Mutex::new(Vec::new()),
        });
        let (handle, writer) = create_event_log(Arc::clone(&store) as Arc<dyn EventStore>, 16);

        handle
            .emit(OrderEvent::LyricApproved {
                order_id: "o-1".to_string(),
                user_id: "u-1".to_string(),
                lyric_id: "l-1".to_string(),
                lyric_version: 1,
                track_id: "t-1".to_string(),
            })
            .await;
        handle.emit(paid("o-2")).await;
        handle.emit(paid("o-1")).await;
        drop(handle);

        writer.run().await;

        assert_eq!(*store.append_sizes.lock().unwrap(), vec![3]);
        let history = store.order_history("o-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, "LYRIC_APPROVED");
        assert_eq!(history[0].user_id.as_deref(), Some("u-1"));
        assert_eq!(history[1].event_type, "PAYMENT_CONFIRMED");
    }

    #[tokio::test]
    async fn test_rejected_batch_keeps_unrelated_events() {
        let store = Arc::new(RefusingOrderStore {
            inner: SqliteEventStore::in_memory().unwrap(),
            refused_order: "o-bad".to_string(),
            append_sizes: Mutex::new(Vec::new()),
        });
        let failed = EVENTS_DROPPED_TOTAL.with_label_values(&["insert_failed"]);
        let before = failed.get();

        let (handle, writer) = create_event_log(Arc::clone(&store) as Arc<dyn EventStore>, 16);
        handle.emit(paid("o-1")).await;
        handle.emit(paid("o-bad")).await;
        handle.emit(paid("o-2")).await;
        drop(handle);

        writer.run().await;

        assert_eq!(store.count(&EventFilter::new()).unwrap(), 2);
        assert!(store.order_history("o-bad").unwrap().is_empty());
        assert_eq!(*store.append_sizes.lock().unwrap(), vec![3, 1, 1, 1]);
        assert!(failed.get() > before);
    }

    #[tokio::test]
    async fn test_writer_waits_for_all_handles_to_drop() {
        let store = Arc::new(SqliteEventStore::in_memory().unwrap());
        let (main_handle, writer) =
            create_event_log(Arc::clone(&store) as Arc<dyn EventStore>, 10);
        let pipeline_handle = main_handle.clone();

        let writer_task = tokio::spawn(writer.run());

        pipeline_handle.emit(paid("o-1")).await;
        drop(main_handle);
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(
            !writer_task.is_finished(),
            "Writer should still be running with handles alive"
        );

        pipeline_handle
            .emit(OrderEvent::ServiceStopped {
                reason: "graceful_shutdown".to_string(),
            })
            .await;
        drop(pipeline_handle);
        let result = tokio::time::timeout(tokio::time::Duration::from_secs(1), writer_task).await;
        assert!(result.is_ok(), "Writer should exit after all handles dropped");

        assert_eq!(store.count(&EventFilter::new()).unwrap(), 2);
    }
}
