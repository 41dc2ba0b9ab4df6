//! 错误类型：HiveError 与对外错误分类 ErrorKind
//!
//! 库内部统一返回 `Result<_, HiveError>`；`kind()` 把细分变体折叠为六类对外错误，
//! 供请求层映射为客户端错误（4xx）或服务端错误（5xx）。

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;

/// 运行过程中可能出现的错误（鉴权、参数、分页、网关不可用、存储等）
#[derive(Error, Debug, Clone)]
pub enum HiveError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Offset {offset} out of range (total {total})")]
    OutOfRange { offset: usize, total: usize },

    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// 调用方超时；对外与 Unavailable 同类
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 对外错误分类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    InvalidArgument,
    NotFound,
    OutOfRange,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HiveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HiveError::Unauthorized(_) => ErrorKind::Unauthorized,
            HiveError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            HiveError::NotFound(_) => ErrorKind::NotFound,
            HiveError::OutOfRange { .. } => ErrorKind::OutOfRange,
            HiveError::Unavailable(_) | HiveError::Timeout(_) => ErrorKind::Unavailable,
            HiveError::Storage(_) | HiveError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 暂时性失败（网关不可用或超时），调用方可稍后重试
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HiveError::Timeout(_))
    }

    /// 校验 / 鉴权 / 查找类错误由调用方造成
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Unauthorized
                | ErrorKind::InvalidArgument
                | ErrorKind::NotFound
                | ErrorKind::OutOfRange
        )
    }

    /// 请求层使用的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Unauthorized => 403,
            ErrorKind::InvalidArgument => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::OutOfRange => 416,
            ErrorKind::Unavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// 对外错误载荷：人类可读信息 + 错误分类
#[derive(Clone, Debug, Serialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<LlmError> for HiveError {
    fn from(err: LlmError) -> Self {
        HiveError::Unavailable(format!("reasoning gateway: {err}"))
    }
}

impl From<std::io::Error> for HiveError {
    fn from(err: std::io::Error) -> Self {
        HiveError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for HiveError {
    fn from(err: serde_json::Error) -> Self {
        HiveError::Storage(format!("serialization: {err}"))
    }
}

impl From<rusqlite::Error> for HiveError {
    fn from(err: rusqlite::Error) -> Self {
        HiveError::Storage(format!("sqlite: {err}"))
    }
}
