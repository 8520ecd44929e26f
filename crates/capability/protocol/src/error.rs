//! 协议错误类型定义

/// upsd 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接、读写失败或超时
    #[error("connection error: {0}")]
    Connection(String),

    /// 未建立连接
    #[error("not connected to upsd")]
    NotConnected,

    /// upsd 返回 `ERR ...`，携带原始应答
    #[error("request error: {0}")]
    Request(String),

    /// 应答格式不符合预期
    #[error("malformed response: {0}")]
    Malformed(String),

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

impl ProtocolError {
    /// 是否为连接级错误（需要断开重连）
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}
