//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）以及推理网关

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod reasoning;
pub mod traits;

use std::sync::Arc;

use crate::config::LlmSection;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use reasoning::ReasoningGateway;
pub use traits::{LlmClient, LlmError, Message, Role};

/// 按配置与 API Key 环境变量选择后端；都不可用时退回 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient);
    }

    // 有 DeepSeek Key 或（配置为 deepseek 且仅有 OpenAI Key 时也走 DeepSeek 兼容端点）
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        tracing::info!("Using DeepSeek LLM ({})", cfg.model);
        Arc::new(create_deepseek_client(Some(&cfg.model)))
    } else if use_openai {
        tracing::info!("Using OpenAI LLM ({})", cfg.model);
        Arc::new(OpenAiClient::new(
            cfg.base_url.as_deref(),
            &cfg.model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}
