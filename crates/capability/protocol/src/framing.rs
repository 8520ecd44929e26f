//! upsd 应答帧解析
//!
//! upsd 协议没有长度前缀，单行应答以 `\n` 结束，LIST 应答以
//! `BEGIN LIST <selector>` 开头、以 `END LIST <selector>` 结束。

use crate::error::ProtocolError;
use domain::VariableValue;

/// 取出缓冲区中第一个完整行（不含 `\n`）的结束位置
pub(crate) fn line_end(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|b| *b == b'\n')
}

/// 缓冲区是否以完整的 footer 行结束
///
/// 只与完整重组后的文本比较，且 footer 必须是最后一整行，
/// 避免载荷中包含 footer 子串时误判。
pub(crate) fn is_list_complete(buf: &[u8], footer: &str) -> bool {
    if buf.last() != Some(&b'\n') {
        return false;
    }
    let body = &buf[..buf.len() - 1];
    let last = match body.iter().rposition(|b| *b == b'\n') {
        Some(pos) => &body[pos + 1..],
        None => body,
    };
    last == footer.as_bytes()
}

/// 去掉 LIST 应答的 header、footer 与末尾空行，返回条目
pub(crate) fn split_list(text: &str, selector: &str) -> Result<Vec<String>, ProtocolError> {
    let lines: Vec<&str> = text.split('\n').collect();
    let header = format!("BEGIN LIST {}", selector);
    if lines.first().copied() != Some(header.as_str()) {
        return Err(ProtocolError::Malformed(format!(
            "expected {:?}, got {:?}",
            header,
            lines.first().copied().unwrap_or_default()
        )));
    }
    // ["BEGIN ...", entries..., "END ...", ""]
    if lines.len() < 3 {
        return Err(ProtocolError::Malformed(format!(
            "truncated list response for {}",
            selector
        )));
    }
    Ok(lines[1..lines.len() - 2]
        .iter()
        .map(|line| line.to_string())
        .collect())
}

/// 解析 `VAR <ups> <var> "<value>"`
///
/// 值为第四个 token；带引号的值可以包含空格（如 `ups.status`）。
/// 值内部的转义引号不做处理。
pub(crate) fn parse_var_response(
    line: &str,
    ups: &str,
    name: &str,
) -> Result<VariableValue, ProtocolError> {
    let malformed = || ProtocolError::Malformed(format!("unexpected GET VAR response: {}", line));

    let tokens: Vec<&str> = line.splitn(4, ' ').collect();
    if tokens.len() != 4 || tokens[0] != "VAR" {
        return Err(malformed());
    }
    if tokens[1] != ups || tokens[2] != name {
        return Err(ProtocolError::Malformed(format!(
            "response for {} {} while requesting {} {}",
            tokens[1], tokens[2], ups, name
        )));
    }

    let raw = tokens[3];
    let value = if raw.starts_with('"') {
        raw.strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or_else(malformed)?
    } else if raw.contains(' ') {
        return Err(malformed());
    } else {
        raw
    };

    Ok(VariableValue::new(ups, name, value))
}
