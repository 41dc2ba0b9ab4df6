//! 执行记录：调度器每次提交后写入的 `execution_<n>` 记忆，以及按时间倒序的历史视图

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::agent::Agent;

pub const EXECUTION_KEY_PREFIX: &str = "execution_";

/// 历史视图中的一条执行记录
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExecutionEntry {
    /// key 的数字后缀（提交前的 execution_count）
    pub execution: u64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

pub fn execution_key(execution_count_before_commit: u64) -> String {
    format!("{EXECUTION_KEY_PREFIX}{execution_count_before_commit}")
}

/// 记忆值：ISO-8601 生成时间 + 截断到 max_chars 个字符的结果
pub fn execution_memory_value(generated_at: DateTime<Utc>, text: &str, max_chars: usize) -> String {
    format!(
        "[{}] {}",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        truncate_chars(text, max_chars)
    )
}

/// 按字符（而非字节）截断，避免切断多字节字符
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// 过滤出 `execution_` 前缀的记忆，按时间戳倒序
pub fn execution_history(agent: &Agent) -> Vec<ExecutionEntry> {
    let mut entries: Vec<ExecutionEntry> = agent
        .memories()
        .iter()
        .filter_map(|m| {
            let suffix = m.key.strip_prefix(EXECUTION_KEY_PREFIX)?;
            let execution = suffix.parse::<u64>().ok()?;
            Some(ExecutionEntry {
                execution,
                text: m.value.clone(),
                timestamp: m.timestamp,
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.execution.cmp(&a.execution))
    });
    entries
}
