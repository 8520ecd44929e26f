pub mod data;
pub mod kind;

pub use data::{DataPoint, FieldValue, Precision, PrecisionParseError};
pub use kind::{ConvertError, ParseKindError, ValueKind};

/// 单变量查询结果：`GET VAR <ups> <name>` 的应答。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableValue {
    pub ups: String,
    pub name: String,
    /// 已去除两侧双引号的值。
    pub value: String,
}

impl VariableValue {
    /// 构造变量值。
    pub fn new(
        ups: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            ups: ups.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}
