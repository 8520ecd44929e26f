//! NUT upsd → InfluxDB 采集守护进程。

use clap::{Parser, Subcommand};
use nutflux_config::AppConfig;
use nutflux_pipeline::{Bridge, BridgeError};
use nutflux_protocol::{NutClient, NutClientConfig};
use nutflux_submit::{Credentials, InfluxTarget, InfluxWriter, LogSink, PointSink};
use nutflux_telemetry::{init_tracing, metrics, record_connection_failure};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// InfluxDB 写入超时
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(name = "nutflux", version, about = "Send NUT UPS statistics to InfluxDB")]
struct Cli {
    /// JSON 配置文件
    #[arg(long, env = "NUTFLUX_CONFIG")]
    config: Option<PathBuf>,

    /// 只打印编码后的数据点，不写入 InfluxDB
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 周期性采集并写入（默认）
    Run,
    /// 打印 LIST 查询结果，例如 `list UPS` 或 `list VAR ups1`
    List {
        #[arg(required = true, num_args = 1..)]
        selector: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    // 初始化结构化日志
    init_tracing();

    let config = AppConfig::load(cli.config.as_deref())?;
    let nut = NutClientConfig {
        host: config.nut_host.clone(),
        port: config.nut_port,
        timeout_ms: config.nut_timeout_ms,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::List { selector } => list(nut, &selector.join(" ")).await,
        Command::Run => run(&config, nut, cli.dry_run).await,
    }
}

async fn list(nut: NutClientConfig, selector: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = NutClient::open(nut).await?;
    let result = client.request_list(selector).await;
    client.disconnect().await;

    for entry in result? {
        println!("{}", entry);
    }
    Ok(())
}

async fn run(
    config: &AppConfig,
    nut: NutClientConfig,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let sink: Arc<dyn PointSink> = if dry_run {
        Arc::new(LogSink)
    } else {
        let target = InfluxTarget {
            host: config.influx_host.clone(),
            database: config.influx_db.clone(),
            credentials: config.influx_creds.clone().map(Credentials::from),
        };
        Arc::new(InfluxWriter::new(target, SUBMIT_TIMEOUT)?)
    };
    let bridge = Bridge::from_config(config, sink);
    let mut client = NutClient::new(nut);

    if config.nut_vars.is_empty() {
        warn!("no nut_vars configured, every cycle will submit nothing");
    }
    info!(
        ups = %config.nut_ups,
        vars = config.nut_vars.len(),
        interval_secs = config.interval,
        "starting poll loop"
    );

    poll_loop(&bridge, &mut client, config.interval(), async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await;

    client.disconnect().await;
    info!(metrics = ?metrics().snapshot(), "stopped");
    Ok(())
}

/// 周期采集，直到 `shutdown` 完成；采集进行中也会响应退出。
async fn poll_loop(
    bridge: &Bridge,
    client: &mut NutClient,
    interval: Duration,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = poll_once(bridge, client) => {}
            _ = &mut shutdown => break,
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => break,
        }
    }
    info!("shutdown requested");
}

async fn poll_once(bridge: &Bridge, client: &mut NutClient) {
    if !client.is_connected() {
        if let Err(err) = client.connect().await {
            error!(error = %err, "cannot reach upsd, skipping cycle");
            record_connection_failure();
            return;
        }
    }

    match bridge.update(client).await {
        Ok(_) => {}
        Err(BridgeError::Protocol(err)) => {
            if err.is_connection() {
                record_connection_failure();
            }
            error!(error = %err, "upsd failure, batch abandoned; reconnecting next cycle");
            client.disconnect().await;
        }
        Err(err) => error!(error = %err, "batch abandoned"),
    }
}
