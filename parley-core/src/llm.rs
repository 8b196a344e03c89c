// ABOUTME: Retried single-prompt calls to the chat backend.
// ABOUTME: Final failures are logged and counted, then reported as None.

use crate::metrics;
use parley_agent::{retry, ChatBackend, ChatMessage, RetryPolicy};

/// Send `prompt` as a lone system message, retrying per `policy`.
/// Returns the trimmed answer, or `None` once every attempt failed.
pub async fn ask(
    backend: &dyn ChatBackend,
    policy: &RetryPolicy,
    operation: &'static str,
    prompt: &str,
) -> Option<String> {
    match retry(policy, operation, move |_attempt| backend.ask(prompt)).await {
        Ok(answer) => Some(answer.trim().to_string()),
        Err(e) => {
            tracing::warn!(operation, error = %e, "Backend unavailable");
            metrics::record_backend_failure(operation);
            None
        }
    }
}

/// Full chat request with retries; `None` once every attempt failed
pub async fn chat(
    backend: &dyn ChatBackend,
    policy: &RetryPolicy,
    messages: &[ChatMessage],
) -> Option<String> {
    match retry(policy, "chat", move |_attempt| backend.chat(messages)).await {
        Ok(answer) => Some(answer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to reach language model");
            metrics::record_backend_failure("chat");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_agent::backends::mock::MockBackend;

    #[tokio::test]
    async fn test_ask_retries_then_succeeds() {
        let mock = MockBackend::new()
            .on_prompt("q")
            .respond_error("down")
            .on_prompt("q")
            .respond_text("  answer \n");
        let answer = ask(&mock, &RetryPolicy::immediate(3), "test", "q").await;
        assert_eq!(answer.as_deref(), Some("answer"));
        assert_eq!(mock.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_ask_gives_up_after_cap() {
        let mock = MockBackend::new().otherwise_error("down");
        let answer = ask(&mock, &RetryPolicy::immediate(3), "test", "q").await;
        assert!(answer.is_none());
        assert_eq!(mock.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_chat_returns_raw_answer() {
        let mock = MockBackend::new().otherwise_text("hello ");
        let answer = chat(&mock, &RetryPolicy::immediate(1), &[ChatMessage::user("hi")]).await;
        assert_eq!(answer.as_deref(), Some("hello "));
    }
}
