use crate::data::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 配置中声明的变量值类型，加载配置时一次性解析。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "str")]
    String,
    #[serde(rename = "int")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Boolean,
}

/// 字符串值无法转换为目标类型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {value:?} to {kind}")]
pub struct ConvertError {
    pub kind: ValueKind,
    pub value: String,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "str",
            Self::Integer => "int",
            Self::Float => "float",
            Self::Boolean => "bool",
        }
    }

    /// 将 upsd 返回的字符串值转换为字段值。
    pub fn convert(&self, raw: &str) -> Result<FieldValue, ConvertError> {
        let fail = || ConvertError {
            kind: *self,
            value: raw.to_string(),
        };
        match self {
            Self::String => Ok(FieldValue::String(raw.to_string())),
            Self::Integer => raw.trim().parse::<i64>().map(FieldValue::I64).map_err(|_| fail()),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FieldValue::F64)
                .ok_or_else(fail),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(FieldValue::Bool(true)),
                "0" | "false" | "no" | "off" => Ok(FieldValue::Bool(false)),
                _ => Err(fail()),
            },
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知的值类型名称。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown value type: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for ValueKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "str" => Ok(Self::String),
            "int" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Boolean),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}
