// ABOUTME: Pluggable language-model and image backend abstraction for parley.
// ABOUTME: Provides trait-based backends (Ollama, SD WebUI, mock), a registry, and a retry policy.

pub mod backends;
pub mod config;
pub mod message;
pub mod registry;
pub mod retry;
pub mod traits;

pub use config::BackendConfig;
pub use message::{ChatMessage, Role};
pub use registry::BackendRegistry;
pub use retry::{retry, RetryPolicy};
pub use traits::{ChatBackend, ImageBackend};
