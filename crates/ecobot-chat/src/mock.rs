//! Scripted completion client for tests and offline runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use ecobot_core::types::Role;

use crate::classifier::{ErrorClassifier, RuleClassifier};
use crate::completion::{
    single_fragment, CompletionClient, CompletionFailure, CompletionRequest, FragmentStream,
    ModelInfo,
};

/// One scripted outcome for a `complete` call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer in one fragment.
    Reply(String),
    /// Answer as a stream of fragments.
    Fragments(Vec<String>),
    /// Fail before the first fragment.
    Fail(CompletionFailure),
    /// Stream these fragments, then fail mid-stream.
    FailAfter(Vec<String>, CompletionFailure),
    /// Answer after a delay.
    Delayed(Duration, String),
    /// Never answer.
    Hang,
}

/// Completion client that replays a queue of scripted replies.
///
/// When the queue is empty it echoes the last user turn, which keeps the
/// binary usable without network access.
pub struct MockCompletionClient {
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
    classifier: Arc<RuleClassifier>,
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            classifier: Arc::new(RuleClassifier::openrouter()),
        }
    }

    /// Queue another reply.
    pub fn push(&self, reply: MockReply) {
        lock(&self.script).push_back(reply);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn echo(request: &CompletionRequest) -> String {
        let last = request
            .messages
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .unwrap_or_default();
        format!("(offline) You said: {}", last)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    fn name(&self) -> &str {
        "Mock"
    }

    fn classifier(&self) -> Arc<dyn ErrorClassifier> {
        self.classifier.clone()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<FragmentStream, CompletionFailure> {
        let next = lock(&self.script).pop_front();
        let echo = Self::echo(&request);
        lock(&self.requests).push(request);

        match next {
            None => Ok(single_fragment(echo)),
            Some(MockReply::Reply(text)) => Ok(single_fragment(text)),
            Some(MockReply::Fragments(parts)) => {
                Ok(Box::pin(tokio_stream::iter(parts.into_iter().map(Ok))))
            }
            Some(MockReply::Fail(failure)) => Err(failure),
            Some(MockReply::FailAfter(parts, failure)) => {
                let items: Vec<Result<String, CompletionFailure>> = parts
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(failure)))
                    .collect();
                Ok(Box::pin(tokio_stream::iter(items)))
            }
            Some(MockReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(single_fragment(text))
            }
            Some(MockReply::Hang) => {
                std::future::pending::<()>().await;
                Ok(single_fragment(String::new()))
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, CompletionFailure> {
        Ok(vec![ModelInfo {
            id: "mock".to_string(),
            display_name: Some("Scripted mock".to_string()),
        }])
    }
}
