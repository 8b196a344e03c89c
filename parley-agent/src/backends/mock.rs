// ABOUTME: Mock backends for testing - return pre-configured replies and record prompts.
// ABOUTME: Allows deterministic tests without a running model server.
//!
//! # Example
//!
//! ```no_run
//! use parley_agent::backends::mock::MockBackend;
//! use parley_agent::ChatBackend;
//!
//! # async fn example() {
//! let mock = MockBackend::new()
//!     .on_prompt("hello").respond_text("Hi there!")
//!     .on_prompt("explode").respond_error("backend down");
//!
//! let reply = mock.ask("hello world").await.unwrap();
//! assert_eq!(reply, "Hi there!");
//! assert_eq!(mock.prompts().len(), 1);
//! # }
//! ```

use crate::message::ChatMessage;
use crate::registry::{ChatFactory, ImageFactory};
use crate::traits::{ChatBackend, ImageBackend};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// PNG signature, enough for tests that only check bytes were written
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Error(String),
}

impl Reply {
    fn into_result(self) -> Result<String> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Error(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

struct Expectation {
    pattern: String,
    reply: Reply,
}

#[derive(Default)]
struct MockState {
    expectations: VecDeque<Expectation>,
    fallback: Option<Reply>,
    prompts: Vec<String>,
}

/// Mock chat backend.
///
/// Cloning shares the same expectation queue and prompt log, so a test can
/// keep a clone for assertions after handing the backend to the code under test.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new mock backend with no expectations
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up an expectation for a prompt containing the given pattern
    pub fn on_prompt(self, pattern: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            backend: self,
            pattern: pattern.to_string(),
        }
    }

    /// Reply used when no expectation matches
    pub fn otherwise_text(self, text: &str) -> Self {
        self.lock().fallback = Some(Reply::Text(text.to_string()));
        self
    }

    /// Error used when no expectation matches
    pub fn otherwise_error(self, message: &str) -> Self {
        self.lock().fallback = Some(Reply::Error(message.to_string()));
        self
    }

    /// Every prompt received so far, message contents joined by newlines
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    /// Number of received prompts containing `needle`
    pub fn prompt_count_containing(&self, needle: &str) -> usize {
        self.lock()
            .prompts
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    /// Expectations not yet consumed
    pub fn pending_expectations(&self) -> usize {
        self.lock().expectations.len()
    }

    /// Factory function for the registry
    pub fn factory() -> ChatFactory {
        Box::new(|config| {
            let mut backend = MockBackend::new();
            if let Some(text) = config["reply"].as_str() {
                backend = backend.otherwise_text(text);
            }
            Ok(Arc::new(backend) as Arc<dyn ChatBackend>)
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, expectation: Expectation) {
        self.lock().expectations.push_back(expectation);
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let text = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let reply = {
            let mut state = self.lock();
            state.prompts.push(text.clone());

            // FIFO preference: check the front first, fall back to searching the
            // queue so concurrent callers still find their expectation.
            let front_matches = state
                .expectations
                .front()
                .is_some_and(|e| text.contains(&e.pattern));
            let matched = if front_matches {
                state.expectations.pop_front()
            } else {
                let position = state
                    .expectations
                    .iter()
                    .position(|e| text.contains(&e.pattern));
                position.and_then(|i| state.expectations.remove(i))
            };
            matched.map(|e| e.reply).or_else(|| state.fallback.clone())
        };

        match reply {
            Some(reply) => reply.into_result(),
            None => {
                let preview: String = text.chars().take(80).collect();
                anyhow::bail!("Mock: no expectation for '{}'", preview)
            }
        }
    }
}

/// Builder for setting up mock expectations with a fluent API
pub struct ExpectationBuilder {
    backend: MockBackend,
    pattern: String,
}

impl ExpectationBuilder {
    /// Respond with a text reply
    pub fn respond_text(self, text: &str) -> MockBackend {
        self.finish(Reply::Text(text.to_string()))
    }

    /// Respond with an error
    pub fn respond_error(self, message: &str) -> MockBackend {
        self.finish(Reply::Error(message.to_string()))
    }

    fn finish(self, reply: Reply) -> MockBackend {
        self.backend.push(Expectation {
            pattern: self.pattern,
            reply,
        });
        self.backend
    }
}

/// Mock image backend returning fixed bytes or a fixed error
#[derive(Clone)]
pub struct MockImageBackend {
    result: Result<Vec<u8>, String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockImageBackend {
    pub fn succeeding(bytes: &[u8]) -> Self {
        Self {
            result: Ok(bytes.to_vec()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Factory function for the registry
    pub fn factory() -> ImageFactory {
        Box::new(|_config| Ok(Arc::new(MockImageBackend::succeeding(FAKE_PNG)) as Arc<dyn ImageBackend>))
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        self.result.clone().map_err(|message| anyhow::anyhow!(message))
    }
}
