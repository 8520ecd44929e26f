//! upsd TCP 客户端实现
//!
//! 一个客户端持有一条到 upsd 的连接，同一时间只允许一个请求在途
//! （所有请求方法都需要 `&mut self`）。连接与每次读取都受固定超时约束，
//! 超时以 [`ProtocolError::Connection`] 返回。客户端不会自动重连。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let mut client = NutClient::open(NutClientConfig::new("127.0.0.1", 3493)).await?;
//! let charge = client.request_variable("ups1", "battery.charge").await?;
//! let upses = client.request_list("UPS").await?;
//! client.disconnect().await;
//! ```

use crate::error::ProtocolError;
use crate::framing::{is_list_complete, line_end, parse_var_response, split_list};
use crate::types::NutClientConfig;
use domain::VariableValue;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// 单次 socket 读取的最大字节数
const READ_CHUNK: usize = 4096;

/// upsd 协议客户端
pub struct NutClient<S = TcpStream> {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Option<S>,
    /// 已读取但尚未消费的字节
    pending: Vec<u8>,
}

impl NutClient<TcpStream> {
    /// 创建未连接的客户端
    pub fn new(config: NutClientConfig) -> Self {
        Self {
            timeout: config.timeout(),
            host: config.host,
            port: config.port,
            stream: None,
            pending: Vec::new(),
        }
    }

    /// 创建客户端并立即连接
    pub async fn open(config: NutClientConfig) -> Result<Self, ProtocolError> {
        let mut client = Self::new(config);
        client.connect().await?;
        Ok(client)
    }

    /// 建立 TCP 连接；已有连接会被替换
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        let addr = format!("{}:{}", self.host, self.port);
        info!("connecting to upsd at {}", addr);

        let stream = match timeout(self.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ProtocolError::Connection(format!(
                    "failed to connect to {}: {}",
                    addr, e
                )));
            }
            Err(_) => {
                return Err(ProtocolError::Connection(format!(
                    "connect to {} timed out after {}ms",
                    addr,
                    self.timeout.as_millis()
                )));
            }
        };

        self.stream = Some(stream);
        self.pending.clear();
        info!("connected to upsd at {}", addr);
        Ok(())
    }
}

impl<S> NutClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// 基于已建立的流创建客户端
    pub fn from_stream(host: impl Into<String>, port: u16, stream: S) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_millis(crate::types::DEFAULT_TIMEOUT_MS),
            stream: Some(stream),
            pending: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// 释放连接；重复调用无副作用
    pub async fn disconnect(&mut self) {
        self.pending.clear();
        if let Some(mut stream) = self.stream.take() {
            match timeout(self.timeout, stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "shutdown failed"),
                Err(_) => debug!("shutdown timed out"),
            }
            info!("disconnected from upsd at {}:{}", self.host, self.port);
        }
    }

    /// 发送一条命令并读取单行应答
    ///
    /// 命令末尾自动追加 `\n`。应答以 `ERR` 开头时返回
    /// [`ProtocolError::Request`]，携带原始应答文本。读取失败时丢弃已收到的半行。
    pub async fn request(&mut self, command: &str) -> Result<String, ProtocolError> {
        let line = match self.exchange(command).await {
            Ok(line) => line,
            Err(err) => {
                self.pending.clear();
                return Err(err);
            }
        };
        debug!(command = %command, response = %line, "received response");

        if line.starts_with("ERR") {
            return Err(ProtocolError::Request(line));
        }
        Ok(line)
    }

    async fn exchange(&mut self, command: &str) -> Result<String, ProtocolError> {
        self.send(command).await?;
        self.read_line().await
    }

    /// `GET VAR <ups> <name>`，返回完整的变量应答
    pub async fn variable(&mut self, ups: &str, name: &str) -> Result<VariableValue, ProtocolError> {
        let line = self.request(&format!("GET VAR {} {}", ups, name)).await?;
        parse_var_response(&line, ups, name)
    }

    /// `GET VAR <ups> <name>`，返回去掉引号的值
    pub async fn request_variable(&mut self, ups: &str, name: &str) -> Result<String, ProtocolError> {
        Ok(self.variable(ups, name).await?.value)
    }

    /// `LIST <selector>`，返回去掉 header/footer 的条目
    ///
    /// 持续读取并拼接分片，直到拼接结果以 `END LIST <selector>` 整行结束。
    /// 任何错误都会丢弃已收到的部分结果。
    pub async fn request_list(&mut self, selector: &str) -> Result<Vec<String>, ProtocolError> {
        let result = self.read_list(selector).await;
        if result.is_err() {
            self.pending.clear();
        }
        result
    }

    async fn read_list(&mut self, selector: &str) -> Result<Vec<String>, ProtocolError> {
        self.send(&format!("LIST {}", selector)).await?;
        let header = format!("BEGIN LIST {}", selector);
        let footer = format!("END LIST {}", selector);

        loop {
            if is_list_complete(&self.pending, &footer) {
                break;
            }
            if let Some(end) = line_end(&self.pending) {
                let first = &self.pending[..end];
                if first.starts_with(b"ERR") {
                    return Err(ProtocolError::Request(decode(first)?));
                }
                if first != header.as_bytes() {
                    return Err(ProtocolError::Malformed(format!(
                        "expected {:?}, got {:?}",
                        header,
                        String::from_utf8_lossy(first)
                    )));
                }
            }
            let n = self.fill().await?;
            debug!(selector = %selector, bytes = n, "received list fragment");
        }

        let raw = std::mem::take(&mut self.pending);
        let text = decode(&raw)?;
        let entries = split_list(&text, selector)?;
        debug!(selector = %selector, entries = entries.len(), "received list");
        Ok(entries)
    }

    async fn send(&mut self, command: &str) -> Result<(), ProtocolError> {
        let timeout_dur = self.timeout;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        let line = format!("{}\n", command);

        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        };
        match timeout(timeout_dur, write).await {
            Ok(Ok(())) => {
                debug!(command = %command, "sent request command");
                Ok(())
            }
            Ok(Err(e)) => Err(ProtocolError::Connection(format!("write failed: {}", e))),
            Err(_) => Err(ProtocolError::Connection(format!(
                "write timed out after {}ms",
                timeout_dur.as_millis()
            ))),
        }
    }

    /// 读取一行应答（不含行尾），必要时多次读取 socket
    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        loop {
            if let Some(end) = line_end(&self.pending) {
                let line: Vec<u8> = self.pending.drain(..=end).collect();
                let text = decode(&line[..end])?;
                return Ok(text.strip_suffix('\r').unwrap_or(&text).to_string());
            }
            self.fill().await?;
        }
    }

    /// 读取一个 socket 分片追加到缓冲区
    async fn fill(&mut self) -> Result<usize, ProtocolError> {
        let timeout_dur = self.timeout;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        let mut buf = [0u8; READ_CHUNK];

        let n = match timeout(timeout_dur, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                warn!("upsd closed the connection");
                return Err(ProtocolError::Connection(
                    "connection closed by upsd".to_string(),
                ));
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(ProtocolError::Connection(format!("read failed: {}", e))),
            Err(_) => {
                return Err(ProtocolError::Connection(format!(
                    "read timed out after {}ms",
                    timeout_dur.as_millis()
                )));
            }
        };

        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

fn decode(bytes: &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ProtocolError::Malformed(format!("response is not utf-8: {}", e)))
}

impl<S> std::fmt::Debug for NutClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NutClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    fn client_pair() -> (NutClient<DuplexStream>, DuplexStream) {
        let (local, remote) = duplex(1024);
        let client =
            NutClient::from_stream("upsbox", 3493, local).with_timeout(Duration::from_millis(200));
        (client, remote)
    }

    async fn expect_command(remote: &mut DuplexStream, expected: &str) {
        let mut buf = vec![0u8; expected.len()];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_request_variable() {
        let (mut client, mut remote) = client_pair();
        let server = tokio::spawn(async move {
            expect_command(&mut remote, "GET VAR ups1 battery.charge\n").await;
            remote
                .write_all(b"VAR ups1 battery.charge \"100\"\n")
                .await
                .unwrap();
            remote
        });

        let value = client.request_variable("ups1", "battery.charge").await.unwrap();
        assert_eq!(value, "100");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_reassembles_split_line() {
        let (mut client, mut remote) = client_pair();
        let server = tokio::spawn(async move {
            expect_command(&mut remote, "VER\n").await;
            remote.write_all(b"Network UPS ").await.unwrap();
            remote.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.write_all(b"Tools upsd 2.8.0\n").await.unwrap();
            remote
        });

        let line = client.request("VER").await.unwrap();
        assert_eq!(line, "Network UPS Tools upsd 2.8.0");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_err_response() {
        let (mut client, mut remote) = client_pair();
        let server = tokio::spawn(async move {
            expect_command(&mut remote, "GET VAR nope battery.charge\n").await;
            remote.write_all(b"ERR UNKNOWN-UPS\n").await.unwrap();
            remote
        });

        let err = client
            .request_variable("nope", "battery.charge")
            .await
            .unwrap_err();
        match err {
            ProtocolError::Request(text) => assert_eq!(text, "ERR UNKNOWN-UPS"),
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_variable_wrong_token_count() {
        let (mut client, mut remote) = client_pair();
        let server = tokio::spawn(async move {
            expect_command(&mut remote, "GET VAR ups1 battery.charge\n").await;
            remote.write_all(b"VAR ups1\n").await.unwrap();
            remote
        });

        let err = client
            .request_variable("ups1", "battery.charge")
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_err_response() {
        let (mut client, mut remote) = client_pair();
        let server = tokio::spawn(async move {
            expect_command(&mut remote, "LIST VAR nope\n").await;
            remote.write_all(b"ERR UNKNOWN-UPS\n").await.unwrap();
            remote
        });

        let err = client.request_list("VAR nope").await.unwrap_err();
        assert!(matches!(err, ProtocolError::Request(ref text) if text == "ERR UNKNOWN-UPS"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_timeout_discards_partial() {
        let (mut client, mut remote) = client_pair();
        let server = tokio::spawn(async move {
            expect_command(&mut remote, "LIST UPS\n").await;
            remote.write_all(b"BEGIN LIST UPS\nUPS a \"x\"\n").await.unwrap();
            // 保持连接但不再发送 footer
            tokio::time::sleep(Duration::from_millis(500)).await;
            remote
        });

        let err = client.request_list("UPS").await.unwrap_err();
        assert!(err.is_connection());
        assert!(client.pending.is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_timeout_discards_partial_line() {
        let (mut client, mut remote) = client_pair();
        let (resume_tx, resume_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            expect_command(&mut remote, "VER\n").await;
            remote.write_all(b"STALE-PART").await.unwrap();
            remote.flush().await.unwrap();
            resume_rx.await.unwrap();
            remote
                .write_all(b"\nNetwork UPS Tools upsd 2.8.0\n")
                .await
                .unwrap();
            expect_command(&mut remote, "VER\n").await;
            remote.write_all(b"Network UPS Tools upsd 2.8.0\n").await.unwrap();
            remote
        });

        let err = client.request("VER").await.unwrap_err();
        assert!(err.is_connection());
        assert!(client.pending.is_empty());
        resume_tx.send(()).unwrap();

        // 迟到的行尾不会再与已丢弃的半行拼接
        let line = client.request("VER").await.unwrap();
        assert_ne!(line, "STALE-PART");
        assert!(!line.contains("STALE"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_is_connection_error() {
        let (mut client, remote) = client_pair();
        drop(remote);

        let err = client.request("VER").await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (mut client, mut remote) = client_pair();
        client.disconnect().await;
        client.disconnect().await;
        assert!(!client.is_connected());

        let err = client.request("VER").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
        let err = client.request_list("UPS").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));

        // 对端只观察到关闭，没有任何命令字节
        let mut buf = Vec::new();
        remote.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_unconnected_client_rejects_requests() {
        let mut client = NutClient::new(NutClientConfig::new("127.0.0.1", 3493));
        assert!(!client.is_connected());

        let err = client.request_variable("ups1", "battery.charge").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
        let err = client.request_list("UPS").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
    }
}
