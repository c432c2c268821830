//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按顺序返回预设回复；脚本耗尽后回显最后一条 User 消息。每次请求都会被记录，便于断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{CompletionOptions, LlmClient, LlmError};
use crate::memory::{Message, Role};

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub options: CompletionOptions,
}

#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for r in replies {
            mock.push_reply(r);
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_replies().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.lock_replies().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, LlmError>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                messages: messages.to_vec(),
                options,
            });

        if let Some(reply) = self.lock_replies().pop_front() {
            return reply;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("Echo from Mock: {}", last_user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_then_echo() {
        let mock = MockLlmClient::with_replies(["first"]);
        mock.push_error(LlmError::EmptyResponse);
        let opts = CompletionOptions::default();

        assert_eq!(mock.complete(&[Message::user("a")], opts).await.unwrap(), "first");
        assert_eq!(mock.complete(&[Message::user("b")], opts).await, Err(LlmError::EmptyResponse));
        assert_eq!(
            mock.complete(&[Message::user("c")], opts).await.unwrap(),
            "Echo from Mock: c"
        );
        assert_eq!(mock.requests().len(), 3);
    }
}
