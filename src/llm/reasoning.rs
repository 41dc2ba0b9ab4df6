//! 推理网关：把 Agent 上下文变成一段生成文本
//!
//! 只负责系统提示词与调用方超时；不做重试，失败交给调度器在下一个 tick 处理。

use std::sync::Arc;
use std::time::Duration;

use crate::core::HiveError;
use crate::llm::{LlmClient, LlmError, Message};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous agent working toward a long-running goal. \
Given your goal, your previous result and your recent memories, produce the next concrete step \
or an updated result. Reply with plain text only.";

pub struct ReasoningGateway {
    client: Arc<dyn LlmClient>,
    system_prompt: String,
    timeout: Duration,
}

impl ReasoningGateway {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self {
            client,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 单轮生成；超时与空结果都视为不可用
    pub async fn generate(&self, context_prompt: &str) -> Result<String, HiveError> {
        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(context_prompt),
        ];

        let text = match tokio::time::timeout(self.timeout, self.client.complete(&messages)).await {
            Ok(result) => result?,
            Err(_) => return Err(HiveError::Timeout(self.timeout)),
        };

        if text.trim().is_empty() {
            return Err(LlmError::EmptyCompletion.into());
        }
        Ok(text)
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.client.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::llm::{MockLlmClient, ScriptedLlmClient};
    use async_trait::async_trait;

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".into())
        }
    }

    #[tokio::test]
    async fn test_generate_with_mock() {
        let gateway = ReasoningGateway::new(Arc::new(MockLlmClient), Duration::from_secs(1));
        let text = gateway.generate("Goal: learn Rust\nLast result: none").await.unwrap();
        assert!(text.contains("learn Rust"));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let gateway = ReasoningGateway::new(Arc::new(SlowClient), Duration::from_millis(20));
        let err = gateway.generate("Goal: x").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_provider_failure_and_blank_output() {
        let client = ScriptedLlmClient::new(Ok("   ".into()))
            .push(Err(LlmError::Network("connection reset".into())));
        let gateway = ReasoningGateway::new(Arc::new(client), Duration::from_secs(1));

        let err = gateway.generate("Goal: x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        let err = gateway.generate("Goal: x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    struct MeteredClient;

    #[async_trait]
    impl LlmClient for MeteredClient {
        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            Ok("ok".into())
        }

        fn token_usage(&self) -> (u64, u64, u64) {
            (12, 30, 42)
        }
    }

    #[test]
    fn test_token_usage_comes_from_client() {
        let gateway = ReasoningGateway::new(Arc::new(MeteredClient), Duration::from_secs(1));
        assert_eq!(gateway.token_usage(), (12, 30, 42));
        let mock = ReasoningGateway::new(Arc::new(MockLlmClient), Duration::from_secs(1));
        assert_eq!(mock.token_usage(), (0, 0, 0));
    }
}
