//! Mock generation provider for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::generation::{Completion, CompletionRequest, GenerationProvider, Protocol, ProviderError};

/// What the mock answers with.
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail { status: u16, message: String },
    Timeout,
}

/// Mock implementation of [`GenerationProvider`].
///
/// Answers with a fixed reply, or with queued replies first. Records every
/// request so tests can assert on prompts and sampling settings.
///
/// ```rust,ignore
/// let provider = MockProvider::with_text(fixtures::TWO_DRAFTS);
/// provider.queue_failure(500, "overloaded");
///
/// // first call fails, second returns the drafts
/// ```
pub struct MockProvider {
    reply: Mutex<Reply>,
    queued: Mutex<VecDeque<Reply>>,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl MockProvider {
    fn with_reply(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            queued: Mutex::new(VecDeque::new()),
            delay: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_reply(Reply::Text(text.into()))
    }

    /// Always fail with a 500 API error.
    pub fn failing() -> Self {
        Self::with_reply(Reply::Fail {
            status: 500,
            message: "mock provider failure".to_string(),
        })
    }

    /// Always report a client-side timeout.
    pub fn timing_out() -> Self {
        Self::with_reply(Reply::Timeout)
    }

    /// Change the default reply to `text`.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.reply.lock().unwrap() = Reply::Text(text.into());
    }

    /// Answer the next call with `text`, then fall back to the default reply.
    pub fn queue_text(&self, text: impl Into<String>) {
        self.queued
            .lock()
            .unwrap()
            .push_back(Reply::Text(text.into()));
    }

    /// Fail the next call with an API error.
    pub fn queue_failure(&self, status: u16, message: impl Into<String>) {
        self.queued.lock().unwrap().push_back(Reply::Fail {
            status,
            message: message.into(),
        });
    }

    /// Delay every answer, e.g. to widen a race window.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.queued.lock().unwrap().pop_front();
        let reply = match queued {
            Some(reply) => reply,
            None => self.reply.lock().unwrap().clone(),
        };

        match reply {
            Reply::Text(text) => Ok(Completion {
                text,
                protocol: Protocol::Chat,
            }),
            Reply::Fail { status, message } => Err(ProviderError::Api { status, message }),
            Reply::Timeout => Err(ProviderError::Timeout(Duration::from_secs(30))),
        }
    }
}
