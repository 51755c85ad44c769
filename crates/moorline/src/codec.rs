//! Row content codec.
//!
//! Table values travel as compact JSON text in the row's `content`
//! column. Encoding failures abort the write that needed them; decoding
//! failures never abort a load, since a corrupt row is indistinguishable
//! from an absent one as far as the host is concerned.

use serde_json::Value;
use tracing::warn;

/// Serialize a table value into row content.
pub fn encode(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Parse row content back into a value.
///
/// Empty or unparseable content decodes to `None`.
pub fn decode(content: &str) -> Option<Value> {
    if content.is_empty() {
        return None;
    }
    match serde_json::from_str(content) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%error, "discarding undecodable row content");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_round_trip() {
        let value = json!({"a": 1, "b": ["x", null], "c": {"d": true}});
        let content = encode(&value).unwrap();
        assert_eq!(decode(&content), Some(value));
    }

    #[test]
    fn empty_content_is_no_value() {
        assert_eq!(decode(""), None);
    }

    #[test]
    fn garbage_content_is_no_value() {
        assert_eq!(decode("{not json"), None);
    }

    #[test]
    fn literal_null_decodes_as_a_value() {
        assert_eq!(decode("null"), Some(Value::Null));
    }
}
