//! 采集流水线：读取 upsd 变量 → 类型转换 → 构造数据点 → 提交。

use async_trait::async_trait;
use domain::DataPoint;
use nutflux_config::{AppConfig, VarConfig};
use nutflux_protocol::{NutClient, ProtocolError};
use nutflux_submit::{PointSink, SubmitError};
use nutflux_telemetry as telemetry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{Instrument, debug, info, warn};

/// 单个采集周期的错误；出现时整批放弃。
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("upsd error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("submit error: {0}")]
    Submit(#[from] SubmitError),
}

impl BridgeError {
    /// 是否需要断开并重连 upsd
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Protocol(err) if err.is_connection())
    }
}

/// upsd 变量读取抽象。
#[async_trait]
pub trait VariableSource: Send {
    async fn request_variable(&mut self, ups: &str, name: &str) -> Result<String, ProtocolError>;
}

#[async_trait]
impl<S> VariableSource for NutClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn request_variable(&mut self, ups: &str, name: &str) -> Result<String, ProtocolError> {
        NutClient::request_variable(self, ups, name).await
    }
}

/// 周期结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub submitted: usize,
    pub skipped: usize,
}

/// 采集桥：一个 UPS、一组变量、共享的标签。
pub struct Bridge {
    ups: String,
    vars: BTreeMap<String, VarConfig>,
    tags: BTreeMap<String, String>,
    sink: Arc<dyn PointSink>,
}

impl Bridge {
    pub fn new(
        ups: impl Into<String>,
        vars: BTreeMap<String, VarConfig>,
        tags: BTreeMap<String, String>,
        sink: Arc<dyn PointSink>,
    ) -> Self {
        Self {
            ups: ups.into(),
            vars,
            tags,
            sink,
        }
    }

    pub fn from_config(config: &AppConfig, sink: Arc<dyn PointSink>) -> Self {
        Self::new(
            config.nut_ups.clone(),
            config.nut_vars.clone(),
            config.influx_tags.clone(),
            sink,
        )
    }

    /// 读取所有变量并构造数据点。
    ///
    /// upsd 返回 `ERR` 或值无法转换时跳过该变量；其他协议错误中止本批。
    pub async fn collect(
        &self,
        source: &mut dyn VariableSource,
    ) -> Result<(Vec<DataPoint>, usize), BridgeError> {
        let mut points = Vec::with_capacity(self.vars.len());
        let mut skipped = 0;

        for (name, var) in &self.vars {
            let raw = match source.request_variable(&self.ups, name).await {
                Ok(raw) => raw,
                Err(ProtocolError::Request(text)) => {
                    warn!(ups = %self.ups, var = %name, error = %text, "request error, skipping");
                    telemetry::record_request_error();
                    skipped += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let value = match var.kind.convert(&raw) {
                Ok(value) => value,
                Err(err) => {
                    warn!(ups = %self.ups, var = %name, error = %err, "conversion failed, skipping");
                    telemetry::record_conversion_error();
                    skipped += 1;
                    continue;
                }
            };

            debug!(ups = %self.ups, var = %name, value = %value, "polled variable");
            telemetry::record_variable_polled();
            points.push(
                DataPoint::new(var.measurement_name.clone())
                    .field("value", value)
                    .with_tags(self.tags.clone()),
            );
        }

        Ok((points, skipped))
    }

    /// 执行一个采集周期并提交结果。
    pub async fn update(&self, source: &mut dyn VariableSource) -> Result<CycleReport, BridgeError> {
        let span = tracing::info_span!(
            "cycle",
            cycle_id = %telemetry::new_cycle_id(),
            ups = %self.ups
        );
        self.run_cycle(source).instrument(span).await
    }

    async fn run_cycle(&self, source: &mut dyn VariableSource) -> Result<CycleReport, BridgeError> {
        telemetry::record_cycle();
        let (points, skipped) = self.collect(source).await?;

        if let Err(err) = self.sink.submit(&points).await {
            telemetry::record_submit_failure();
            return Err(err.into());
        }
        telemetry::record_points_submitted(points.len() as u64);
        info!(submitted = points.len(), skipped, "cycle complete");

        Ok(CycleReport {
            submitted: points.len(),
            skipped,
        })
    }
}
