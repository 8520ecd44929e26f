use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 字段值的数据类型。
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    I64(i64),
    F64(f64),
    Bool(bool),
    String(String),
}

impl fmt::Display for FieldValue {
    /// 规范文本形式（字符串不加引号）。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::String(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::I64(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// 时间戳精度（SI 前缀单字符）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Hours,
}

impl Precision {
    /// 提交时使用的精度代码。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "n",
            Self::Microseconds => "u",
            Self::Milliseconds => "m",
            Self::Seconds => "s",
            Self::Hours => "h",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的精度代码。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timestamp precision: {0}")]
pub struct PrecisionParseError(pub String);

impl FromStr for Precision {
    type Err = PrecisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "n" => Ok(Self::Nanoseconds),
            "u" => Ok(Self::Microseconds),
            "m" => Ok(Self::Milliseconds),
            "s" => Ok(Self::Seconds),
            "h" => Ok(Self::Hours),
            other => Err(PrecisionParseError(other.to_string())),
        }
    }
}

/// 待写入时序库的数据点。
///
/// 字段与标签使用 `BTreeMap`，编码顺序按键排序，输出可复现。
/// 每个数据点独立持有自己的标签表。
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub measurement: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub tags: BTreeMap<String, String>,
    pub timestamp: Option<i64>,
    pub precision: Precision,
}

impl DataPoint {
    /// 构造无字段、无标签、无时间戳的数据点。
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            fields: BTreeMap::new(),
            tags: BTreeMap::new(),
            timestamp: None,
            precision: Precision::default(),
        }
    }

    /// 添加（或覆盖）一个字段。
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 添加（或覆盖）一个标签。
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 以给定标签表替换当前标签。
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// 实际生效的精度：仅在存在时间戳时返回。
    pub fn effective_precision(&self) -> Option<Precision> {
        self.timestamp.map(|_| self.precision)
    }
}
