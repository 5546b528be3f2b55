//! Dot-notation path lookup
//!
//! Supports paths like `$.data.token`, `content.survey` and `items[0]` or
//! `items[-1]` for array indexing.

use serde_json::Value;

/// Look up a value by dot-notation path
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        // Handle array indexing like "data[0]" or "items[-1]"
        if let Some(bracket_pos) = part.find('[') {
            let name = &part[..bracket_pos];
            let index_str = part[bracket_pos + 1..].strip_suffix(']')?;

            if !name.is_empty() {
                current = current.get(name)?;
            }

            let index = index_str.parse::<i64>().ok()?;
            let Value::Array(arr) = current else {
                return None;
            };
            #[allow(clippy::cast_possible_wrap)]
            let idx = if index < 0 {
                arr.len() as i64 + index
            } else {
                index
            };
            if idx < 0 {
                return None;
            }
            current = arr.get(idx as usize)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current)
}

/// Look up a scalar by path and render it as a string
pub fn extract_path_string(value: &Value, path: &str) -> Option<String> {
    match extract_path(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Look up an unsigned integer by path, accepting numeric strings
pub fn extract_path_u64(value: &Value, path: &str) -> Option<u64> {
    match extract_path(value, path)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
