// ABOUTME: Conversation state, profile memory and the message dispatch pipeline
// ABOUTME: Everything the HTTP layer needs, independent of any web framework

pub mod classifier;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod documents;
pub mod error;
pub mod feedback;
pub mod files;
pub mod flusher;
pub mod generate;
pub mod llm;
pub mod metrics;
pub mod paths;
pub mod profile;
pub mod prompts;
pub mod sanitize;
pub mod settings;
pub mod state;
pub mod store;

pub use config::Config;
pub use conversation::{Chat, ChatSummary, ConversationBlock, ConversationStore};
pub use dispatch::{Dispatcher, Outcome, SendResult};
pub use error::{CoreError, CoreResult};
pub use state::Stores;

// Re-export the backend abstraction so the binary needs a single import path
pub use parley_agent::{BackendConfig, BackendRegistry, ChatBackend, ImageBackend, RetryPolicy};
