//! 数据点提交能力：InfluxDB `/write` 接口。

use async_trait::async_trait;
use domain::{DataPoint, Precision};
use nutflux_line_protocol::{EncodeError, encode_batch};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// 提交错误。
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("influxdb returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// 用户名/口令，配置中写作 `["user", "secret"]`。
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, String)")]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl From<(String, String)> for Credentials {
    fn from((username, password): (String, String)) -> Self {
        Self { username, password }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 写入目标。
#[derive(Debug, Clone)]
pub struct InfluxTarget {
    /// `proto://host:port`
    pub host: String,
    pub database: String,
    pub credentials: Option<Credentials>,
}

impl InfluxTarget {
    pub fn write_url(&self) -> String {
        format!("{}/write", self.host.trim_end_matches('/'))
    }
}

/// 一批数据点的提交精度：取最后一个带时间戳数据点的精度。
pub fn batch_precision(points: &[DataPoint]) -> Option<Precision> {
    points
        .iter()
        .filter_map(DataPoint::effective_precision)
        .last()
}

/// `/write` 查询参数：`db`，可选 `u`/`p`，可选 `precision`。
pub fn write_query(target: &InfluxTarget, points: &[DataPoint]) -> Vec<(&'static str, String)> {
    let mut query = vec![("db", target.database.clone())];
    if let Some(creds) = &target.credentials {
        query.push(("u", creds.username.clone()));
        query.push(("p", creds.password.clone()));
    }
    if let Some(precision) = batch_precision(points) {
        query.push(("precision", precision.as_str().to_string()));
    }
    query
}

/// 数据点提交接口。
#[async_trait]
pub trait PointSink: Send + Sync {
    async fn submit(&self, points: &[DataPoint]) -> Result<(), SubmitError>;
}

/// 基于 HTTP 的 InfluxDB 写入器。
#[derive(Debug, Clone)]
pub struct InfluxWriter {
    client: reqwest::Client,
    target: InfluxTarget,
}

impl InfluxWriter {
    pub fn new(target: InfluxTarget, timeout: Duration) -> Result<Self, SubmitError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SubmitError::Transport(err.to_string()))?;
        Ok(Self { client, target })
    }

    pub fn target(&self) -> &InfluxTarget {
        &self.target
    }
}

#[async_trait]
impl PointSink for InfluxWriter {
    async fn submit(&self, points: &[DataPoint]) -> Result<(), SubmitError> {
        if points.is_empty() {
            debug!("empty batch, nothing to submit");
            return Ok(());
        }
        let body = encode_batch(points)?;
        let url = self.target.write_url();
        debug!(url = %url, points = points.len(), "submitting batch");

        let response = self
            .client
            .post(&url)
            .query(&write_query(&self.target, points))
            .body(body)
            .send()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// 只记录日志、不发送的写入器（用于 dry-run）。
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl PointSink for LogSink {
    async fn submit(&self, points: &[DataPoint]) -> Result<(), SubmitError> {
        let body = encode_batch(points)?;
        for line in body.lines() {
            info!(line = %line, "dry-run point");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(credentials: Option<Credentials>) -> InfluxTarget {
        InfluxTarget {
            host: "http://127.0.0.1:8086/".to_string(),
            database: "systems".to_string(),
            credentials,
        }
    }

    #[test]
    fn write_url_strips_trailing_slash() {
        assert_eq!(target(None).write_url(), "http://127.0.0.1:8086/write");
    }

    #[test]
    fn credentials_redacted_in_debug() {
        let creds = Credentials::from(("admin".to_string(), "sekrit".to_string()));
        let printed = format!("{:?}", creds);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("sekrit"));
    }
}
