use crate::error::{EdfError, Result};

/// 检查字符串是否为有效的整数
pub fn is_integer_number(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }

    let digits = s.strip_prefix(&['+', '-'][..]).unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// 检查字符串是否为有效的有限数字（包括浮点数）
pub fn is_number(s: &str) -> bool {
    let s = s.trim();
    // Rust 的 parse 接受 "inf"/"NaN"，EDF 头部不允许
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && s.parse::<f64>().map_or(false, f64::is_finite)
}

/// Reads a fixed-width ASCII field and strips its space padding
pub fn field_str(bytes: &[u8], offset: usize, width: usize) -> String {
    String::from_utf8_lossy(&bytes[offset..offset + width])
        .trim()
        .to_string()
}

/// Parses a fixed-width integer field, reporting the field name and offset on failure
pub fn parse_int_field(bytes: &[u8], field: &'static str, offset: usize, width: usize) -> Result<i64> {
    let raw = field_str(bytes, offset, width);
    if !is_integer_number(&raw) {
        return Err(malformed(field, offset, raw));
    }
    raw.parse::<i64>().map_err(|_| malformed(field, offset, raw.clone()))
}

/// Parses a fixed-width floating point field
pub fn parse_float_field(bytes: &[u8], field: &'static str, offset: usize, width: usize) -> Result<f64> {
    let raw = field_str(bytes, offset, width);
    if !is_number(&raw) {
        return Err(malformed(field, offset, raw));
    }
    let value = raw.parse::<f64>().map_err(|_| malformed(field, offset, raw.clone()))?;
    // 只接受写回后数值不变的字段
    if normalize_number(value, width) != Some(value) {
        return Err(malformed(field, offset, raw));
    }
    Ok(value)
}

/// Reads a fixed-width text field, which must be printable 7-bit ASCII
pub fn parse_text_field(bytes: &[u8], field: &'static str, offset: usize, width: usize) -> Result<String> {
    let raw = &bytes[offset..offset + width];
    if !raw.iter().all(|b| (32..=126).contains(b)) {
        return Err(malformed(field, offset, field_str(bytes, offset, width)));
    }
    Ok(field_str(bytes, offset, width))
}

pub(crate) fn malformed(field: &'static str, offset: usize, value: impl Into<String>) -> EdfError {
    EdfError::MalformedHeader {
        field,
        offset,
        value: value.into(),
    }
}

/// Formats a number for an 8-character EDF header field.
///
/// Uses the shortest exact representation when it fits, otherwise drops
/// decimal places until it does. Small magnitudes whose decimal form would
/// lose significant digits switch to exponent notation (`1e-7`). Returns
/// `None` when even the integer part needs more than `width` characters.
pub fn format_number(value: f64, width: usize) -> Option<String> {
    if !value.is_finite() {
        return None;
    }

    let exact = format!("{}", value);
    if exact.len() <= width {
        return Some(exact);
    }

    let decimal = format_decimal(value, width);
    if value.abs() < 1.0 {
        if let Some(exponent) = format_exponent(value, width) {
            let error = |s: &str| s.parse::<f64>().map_or(f64::INFINITY, |v| (v - value).abs());
            if decimal.as_deref().map_or(true, |d| error(&exponent) < error(d)) {
                return Some(exponent);
            }
        }
    }
    decimal
}

fn format_decimal(value: f64, width: usize) -> Option<String> {
    for precision in (0..width).rev() {
        let s = format!("{:.prec$}", value, prec = precision);
        let s = if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        };
        if s.len() <= width {
            // "-0" 之类的结果统一写成 "0"
            return Some(if s == "-0" { "0".to_string() } else { s });
        }
    }
    None
}

fn format_exponent(value: f64, width: usize) -> Option<String> {
    for precision in (0..width).rev() {
        let s = format!("{:.prec$e}", value, prec = precision);
        let s = match s.split_once('e') {
            Some((mantissa, exponent)) if mantissa.contains('.') => format!(
                "{}e{}",
                mantissa.trim_end_matches('0').trim_end_matches('.'),
                exponent
            ),
            _ => s,
        };
        if s.len() <= width {
            return Some(s);
        }
    }
    None
}

/// Returns the value a number will have after a write/parse cycle through a
/// fixed-width header field.
pub fn normalize_number(value: f64, width: usize) -> Option<f64> {
    format_number(value, width).and_then(|s| s.parse().ok())
}

/// Copies `value` into `buf[offset..offset + width]`, space padded.
///
/// The caller guarantees the value fits; anything longer is cut at `width`.
pub fn put_field(buf: &mut [u8], offset: usize, width: usize, value: &str) {
    let field = &mut buf[offset..offset + width];
    field.fill(b' ');
    let bytes = value.as_bytes();
    let len = bytes.len().min(width);
    field[..len].copy_from_slice(&bytes[..len]);
}

/// Checks that a text field is printable 7-bit ASCII and fits its width
pub fn check_text_field(field: &'static str, value: &str, width: usize) -> Result<()> {
    if let Some(c) = value.chars().find(|c| !(' '..='~').contains(c)) {
        return Err(EdfError::InvalidField {
            field,
            reason: format!("character {:?} is not printable ASCII", c),
        });
    }
    if value.len() > width {
        return Err(EdfError::InvalidField {
            field,
            reason: format!("{} bytes exceeds the {}-byte field", value.len(), width),
        });
    }
    Ok(())
}
