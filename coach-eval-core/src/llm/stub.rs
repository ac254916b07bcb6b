//! Scripted LLM provider for offline runs and tests
//!
//! Replies are chosen by substring match against the request text, with an
//! optional queue of one-shot replies consulted first. Token counts are
//! whitespace word counts so results are deterministic.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{LLMProvider, LLMRequest, LLMResponse, ModelInfo, TokenUsage};
use crate::error::{EvalError, Result};

/// A predetermined provider reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Successful completion with this text
    Text(String),
    /// Provider failure with this message
    Error(String),
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        ScriptedReply::Text(content.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        ScriptedReply::Error(message.into())
    }
}

/// LLM provider that answers from a script instead of the network
pub struct ScriptedLLMProvider {
    model: String,
    rules: Vec<(String, ScriptedReply)>,
    queue: Mutex<VecDeque<ScriptedReply>>,
    default_reply: ScriptedReply,
    calls: AtomicUsize,
    requests: Mutex<Vec<LLMRequest>>,
}

impl ScriptedLLMProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            default_reply: ScriptedReply::text(""),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `content` when the request text contains `needle`
    pub fn respond_when(mut self, needle: impl Into<String>, content: impl Into<String>) -> Self {
        self.rules
            .push((needle.into(), ScriptedReply::text(content)));
        self
    }

    /// Fail with `message` when the request text contains `needle`
    pub fn fail_when(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules
            .push((needle.into(), ScriptedReply::error(message)));
        self
    }

    /// Reply used when no rule matches
    pub fn with_default(mut self, reply: ScriptedReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// One-shot replies served in order before any rule is consulted
    pub fn with_queue(self, replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(replies);
        }
        self
    }

    /// Number of requests served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received, in arrival order
    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn pick(&self, text: &str) -> ScriptedReply {
        if let Some(reply) = self.queue.lock().ok().and_then(|mut q| q.pop_front()) {
            return reply;
        }
        self.rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[async_trait]
impl LLMProvider for ScriptedLLMProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        let text = request.full_text();
        match self.pick(&text) {
            ScriptedReply::Text(content) => {
                let usage = TokenUsage::new(word_count(&text), word_count(&content));
                Ok(LLMResponse {
                    content,
                    usage: Some(usage),
                })
            }
            ScriptedReply::Error(message) => Err(EvalError::Provider(message)),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: self.model.clone(),
        }
    }
}
