//! 日志初始化、采集周期 ID 与基础计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub variables_polled: u64,
    pub request_errors: u64,
    pub conversion_errors: u64,
    pub points_submitted: u64,
    pub submit_failures: u64,
    pub connection_failures: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    cycles: AtomicU64,
    variables_polled: AtomicU64,
    request_errors: AtomicU64,
    conversion_errors: AtomicU64,
    points_submitted: AtomicU64,
    submit_failures: AtomicU64,
    connection_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            variables_polled: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            conversion_errors: AtomicU64::new(0),
            points_submitted: AtomicU64::new(0),
            submit_failures: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            variables_polled: self.variables_polled.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
            conversion_errors: self.conversion_errors.load(Ordering::Relaxed),
            points_submitted: self.points_submitted.load(Ordering::Relaxed),
            submit_failures: self.submit_failures.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可用 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的采集周期 ID。
pub fn new_cycle_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录一次采集周期。
pub fn record_cycle() {
    metrics().cycles.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功读取的变量数。
pub fn record_variable_polled() {
    metrics().variables_polled.fetch_add(1, Ordering::Relaxed);
}

/// 记录 upsd 返回 ERR 的次数。
pub fn record_request_error() {
    metrics().request_errors.fetch_add(1, Ordering::Relaxed);
}

/// 记录类型转换失败次数。
pub fn record_conversion_error() {
    metrics().conversion_errors.fetch_add(1, Ordering::Relaxed);
}

/// 记录提交成功的数据点数。
pub fn record_points_submitted(count: u64) {
    metrics().points_submitted.fetch_add(count, Ordering::Relaxed);
}

/// 记录提交失败次数。
pub fn record_submit_failure() {
    metrics().submit_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接失败次数。
pub fn record_connection_failure() {
    metrics().connection_failures.fetch_add(1, Ordering::Relaxed);
}
