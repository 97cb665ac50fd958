//! Language model returning canned replies.

use async_trait::async_trait;
use browse_proto::{LanguageModel, ModelError};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// A model that answers from a queue and records every prompt.
///
/// Once the queue is empty every call fails with a malformed-response error.
#[derive(Debug, Default)]
pub struct MockModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    /// Creates a model that returns `replies` in order.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Creates a model whose first call fails with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(message.into())])),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        let next = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ModelError::Transport(message)),
            None => Err(ModelError::MalformedResponse(
                "no scripted reply left".to_string(),
            )),
        }
    }
}
