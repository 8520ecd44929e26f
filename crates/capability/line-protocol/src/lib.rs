//! InfluxDB 行协议编码。
//!
//! ```text
//! <measurement>[,<tag_k>=<tag_v>,...] <field_k>=<field_repr>[,...][ <timestamp>]
//! ```
//!
//! 字符串字段原样包裹双引号，不转义内部引号；数值与布尔值使用规范文本。
//! 精度不写入行内，只通过提交时的 `precision` 查询参数传递。

use domain::{DataPoint, FieldValue};

/// 编码错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("invalid point {measurement:?}: {reason}")]
    InvalidPoint { measurement: String, reason: String },
}

fn invalid(point: &DataPoint, reason: impl Into<String>) -> EncodeError {
    EncodeError::InvalidPoint {
        measurement: point.measurement.clone(),
        reason: reason.into(),
    }
}

/// 校验数据点可以编码。
pub fn validate(point: &DataPoint) -> Result<(), EncodeError> {
    if point.measurement.is_empty() {
        return Err(invalid(point, "empty measurement name"));
    }
    if point.fields.is_empty() {
        return Err(invalid(point, "no fields"));
    }
    for (key, value) in &point.fields {
        if let FieldValue::F64(v) = value {
            if !v.is_finite() {
                return Err(invalid(point, format!("field {} is not finite", key)));
            }
        }
    }
    Ok(())
}

/// 编码单个数据点为一行。
pub fn encode_point(point: &DataPoint) -> Result<String, EncodeError> {
    validate(point)?;

    let mut line = point.measurement.clone();
    for (key, value) in &point.tags {
        line.push_str(&format!(",{}={}", key, value));
    }

    line.push(' ');
    let fields = point
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, field_repr(value)))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str(&fields);

    if let Some(timestamp) = point.timestamp {
        line.push_str(&format!(" {}", timestamp));
    }

    line.truncate(line.trim_end().len());
    Ok(line)
}

/// 编码一批数据点，行之间以单个 `\n` 分隔，末尾无换行。
///
/// 任一数据点非法时整批拒绝。
pub fn encode_batch(points: &[DataPoint]) -> Result<String, EncodeError> {
    let lines = points
        .iter()
        .map(encode_point)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

fn field_repr(value: &FieldValue) -> String {
    match value {
        FieldValue::String(v) => format!("\"{}\"", v),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_repr_quotes_strings_only() {
        assert_eq!(field_repr(&FieldValue::from("ok")), "\"ok\"");
        assert_eq!(field_repr(&FieldValue::I64(42)), "42");
        assert_eq!(field_repr(&FieldValue::F64(0.5)), "0.5");
        assert_eq!(field_repr(&FieldValue::Bool(false)), "false");
        // 已知限制：内部引号不转义
        assert_eq!(field_repr(&FieldValue::from("a\"b")), "\"a\"b\"");
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let point = DataPoint::new("status").field("value", "OL ");
        assert_eq!(encode_point(&point).unwrap(), "status value=\"OL \"");

        let point = DataPoint::new("status").field("value", "");
        assert_eq!(encode_point(&point).unwrap(), "status value=\"\"");
    }
}
