//! Serde helpers for the backend's legacy field encodings.

use serde::{de, Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Deserializes a string-ish field that may arrive as a string, a number or
/// null. Blank strings become `None`.
pub fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

pub fn value_to_string(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => return None,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `"1"`/`"0"` flag encoding. Accepts `Y`/`N`, `true`/`false` and numbers
/// on the way in; always writes `"1"` or `"0"`.
pub mod yn_flag {
    use super::*;

    pub fn serialize<S>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *flag { "1" } else { "0" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        match value {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::Number(n)) => Ok(n.as_i64().unwrap_or(0) != 0),
            Some(Value::String(s)) => match s.trim() {
                "1" | "Y" | "y" | "true" | "TRUE" => Ok(true),
                "" | "0" | "N" | "n" | "false" | "FALSE" => Ok(false),
                other => Err(de::Error::custom(format!("invalid flag value: {}", other))),
            },
            Some(other) => Err(de::Error::custom(format!("invalid flag value: {}", other))),
        }
    }
}
