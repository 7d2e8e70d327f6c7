//! Scripted [`LlmService`] for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::LlmService;
use crate::error::LlmError;
use crate::Result;

/// One recorded completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Replays canned responses in order; the last one repeats.
///
/// An `Err` entry is returned as [`LlmError::Http`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedLlm {
    responses: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, entry: std::result::Result<String, String>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Request {
                system: system.to_string(),
                prompt: prompt.to_string(),
                max_tokens,
            });

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(LlmError::Http(message)),
            None => Err(LlmError::EmptyResponse),
        }
    }
}
