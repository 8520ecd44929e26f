//! 协议相关类型定义

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// upsd 默认端口
pub const DEFAULT_PORT: u16 = 3493;

/// 连接与每次读取的超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// upsd 客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutClientConfig {
    /// upsd 主机地址
    pub host: String,
    /// upsd 端口（默认 3493）
    #[serde(default = "default_port")]
    pub port: u16,
    /// 连接与读取超时（毫秒）
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl NutClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port` 形式的地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
