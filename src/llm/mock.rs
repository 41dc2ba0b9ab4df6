//! Mock LLM 客户端（本地运行与测试，无需 API）
//!
//! MockLlmClient 取最后一条 User 消息中的目标行并回显一个确定性的“下一步”；
//! ScriptedLlmClient 按顺序返回预设结果，可注入失败。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, Role};

#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        let goal = last_user
            .lines()
            .find_map(|l| l.strip_prefix("Goal: "))
            .unwrap_or(last_user);

        Ok(format!("Next step toward \"{}\": review progress and continue.", goal.trim()))
    }
}

/// 脚本化客户端：依次弹出预设响应，耗尽后使用 fallback
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Result<String, LlmError>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new(fallback: Result<String, LlmError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(self, response: Result<String, LlmError>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到过的 User 消息
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(user) = messages.iter().rev().find(|m| m.role == Role::User) {
            self.prompts
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(user.content.clone());
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
