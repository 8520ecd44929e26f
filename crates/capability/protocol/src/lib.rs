//! # upsd 协议客户端
//!
//! 与 NUT（Network UPS Tools）守护进程 upsd 通信：
//! - **请求/应答**：以 `\n` 结尾的单行命令与单行应答，`ERR` 开头表示失败
//! - **GET VAR**：读取单个 UPS 变量
//! - **LIST**：多分片、由 `BEGIN LIST` / `END LIST` 包围的列表应答
//!
//! ## 状态机
//!
//! ```text
//! Disconnected ──connect()──▶ Connected
//!      ▲                          │
//!      └──────disconnect()────────┘
//! ```
//!
//! 未连接时所有请求都返回 [`ProtocolError::NotConnected`]，不触发任何网络 I/O。
//!
//! ## 配置格式
//!
//! ```json
//! { "host": "127.0.0.1", "port": 3493, "timeout_ms": 2000 }
//! ```

mod client;
mod error;
mod framing;
mod types;

pub use client::NutClient;
pub use error::ProtocolError;
pub use types::*;
