//! Scripted completion backend for tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{CompletionBackend, CompletionError};

/// One scripted outcome for a [`MockLlm`] call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Reply(String),
    RateLimited,
    Error(u16, String),
    Empty,
}

impl MockReply {
    fn into_result(self) -> Result<String, CompletionError> {
        match self {
            MockReply::Reply(text) => Ok(text),
            MockReply::RateLimited => Err(CompletionError::RateLimited),
            MockReply::Error(status, message) => Err(CompletionError::Api { status, message }),
            MockReply::Empty => Err(CompletionError::EmptyCompletion),
        }
    }
}

/// Replays a scripted sequence of replies; the last entry repeats once
/// the sequence is exhausted. Records every call.
pub struct MockLlm {
    name: String,
    replies: Mutex<Vec<MockReply>>,
    call_count: AtomicUsize,
    last_document: Mutex<Option<String>>,
}

impl MockLlm {
    pub fn new(name: &str, reply: MockReply) -> Self {
        Self::with_sequence(name, vec![reply])
    }

    pub fn with_sequence(name: &str, replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "mock needs at least one reply");
        Self {
            name: name.to_string(),
            replies: Mutex::new(replies),
            call_count: AtomicUsize::new(0),
            last_document: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The document text of the most recent call.
    pub fn last_document(&self) -> Option<String> {
        self.last_document.lock().unwrap().clone()
    }
}

impl CompletionBackend for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete<'a>(
        &'a self,
        _system_prompt: &'a str,
        document_text: &'a str,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(async move {
            let index = self.call_count.fetch_add(1, Ordering::SeqCst);
            *self.last_document.lock().unwrap() = Some(document_text.to_string());
            let replies = self.replies.lock().unwrap();
            let reply = replies
                .get(index)
                .unwrap_or_else(|| replies.last().expect("non-empty"))
                .clone();
            drop(replies);
            reply.into_result()
        })
    }
}
