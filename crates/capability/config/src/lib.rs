//! 应用运行配置加载。
//!
//! 配置文件为 JSON，与内置默认值深度合并后反序列化：
//!
//! ```json
//! {
//!   "nut_ups": "ups1",
//!   "nut_vars": {
//!     "ups.realpower.nominal": { "type": "int", "measurement_name": "ups1_power" }
//!   },
//!   "influx_tags": { "host": "nas" },
//!   "influx_creds": ["user", "sekrit"]
//! }
//! ```

use domain::ValueKind;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {0}: {1}")]
    Io(String, String),
    #[error("cannot parse config: {0}")]
    Parse(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 单个 upsd 变量的采集配置。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VarConfig {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub measurement_name: String,
}

/// 应用运行配置。
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 采集间隔（秒）
    pub interval: u64,
    pub nut_host: String,
    pub nut_port: u16,
    pub nut_ups: String,
    pub nut_timeout_ms: u64,
    pub nut_vars: BTreeMap<String, VarConfig>,
    /// `proto://host:port`
    pub influx_host: String,
    pub influx_db: String,
    pub influx_tags: BTreeMap<String, String>,
    pub influx_creds: Option<(String, String)>,
}

/// 内置默认配置。
pub fn default_config() -> Value {
    json!({
        "interval": 20,
        "nut_host": "127.0.0.1",
        "nut_port": 3493,
        "nut_ups": "ups1",
        "nut_timeout_ms": 2000,
        "nut_vars": {},
        "influx_host": "http://127.0.0.1:8086",
        "influx_db": "systems",
        "influx_tags": {},
        "influx_creds": null
    })
}

/// 将 `overlay` 递归合并进 `base`：对象逐键合并，其余类型整体替换。
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

impl AppConfig {
    /// 读取配置文件；未指定路径时使用默认配置。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|err| ConfigError::Io(path.display().to_string(), err.to_string()))?;
                Self::from_json(&text)
            }
            None => Self::from_value(json!({})),
        }
    }

    /// 从 JSON 文本解析并合并默认值。
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let user: Value =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Self::from_value(user)
    }

    pub fn from_value(user: Value) -> Result<Self, ConfigError> {
        if !user.is_object() {
            return Err(ConfigError::Parse("config root must be an object".to_string()));
        }
        let mut merged = default_config();
        deep_merge(&mut merged, user);
        let config: AppConfig =
            serde_json::from_value(merged).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(invalid("interval", "must be greater than 0"));
        }
        if self.nut_port == 0 {
            return Err(invalid("nut_port", "must be greater than 0"));
        }
        if self.nut_timeout_ms == 0 {
            return Err(invalid("nut_timeout_ms", "must be greater than 0"));
        }
        if self.nut_ups.trim().is_empty() {
            return Err(invalid("nut_ups", "must not be empty"));
        }
        if self.influx_db.trim().is_empty() {
            return Err(invalid("influx_db", "must not be empty"));
        }
        for (name, var) in &self.nut_vars {
            if var.measurement_name.trim().is_empty() {
                return Err(invalid(
                    &format!("nut_vars.{}.measurement_name", name),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid(key.to_string(), reason.to_string())
}
