//! Response normalization shared by every transport attempt.

use serde_json::Value;

use crate::errors::AttemptError;

/// Parse a raw response body into JSON.
///
/// A body whose first non-whitespace character is `<` is a relay landing or
/// error page and is rejected before any parse is attempted.
pub fn normalize(raw: &str) -> Result<Value, AttemptError> {
    if looks_like_html(raw) {
        return Err(AttemptError::WrongContentType);
    }
    serde_json::from_str(raw).map_err(|e| AttemptError::MalformedPayload(e.to_string()))
}

pub fn looks_like_html(raw: &str) -> bool {
    raw.trim_start().starts_with('<')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_is_wrong_content_type() {
        assert_eq!(normalize("<html>Error 502</html>"), Err(AttemptError::WrongContentType));
        assert_eq!(
            normalize("<!DOCTYPE html><html></html>"),
            Err(AttemptError::WrongContentType)
        );
        assert_eq!(
            normalize("\n   <!doctype html>"),
            Err(AttemptError::WrongContentType)
        );
    }

    #[test]
    fn test_valid_json_parses() {
        assert_eq!(
            normalize(r#"{"ok":true,"data":[]}"#).unwrap(),
            json!({"ok": true, "data": []})
        );
        assert_eq!(normalize("  [1,2]  ").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            normalize("Too Many Requests"),
            Err(AttemptError::MalformedPayload(_))
        ));
        assert!(matches!(normalize(""), Err(AttemptError::MalformedPayload(_))));
        assert!(matches!(
            normalize(r#"{"ok":tru"#),
            Err(AttemptError::MalformedPayload(_))
        ));
    }
}
