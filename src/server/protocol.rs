//! NDJSON request/response types for the serve loop.

use serde::{Deserialize, Serialize};

/// One request line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed back unchanged. Any JSON value.
    #[serde(default)]
    pub id: serde_json::Value,
    /// Operation name (e.g. "add_item", "active_context")
    pub op: String,
    /// Operation-specific parameters
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: serde_json::Value,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Serialize as a single line without the trailing newline.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"id":null,"ok":false,"error":"serialize error"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_params() {
        let req: Request = serde_json::from_str(r#"{"id":1,"op":"summary"}"#).unwrap();
        assert_eq!(req.op, "summary");
        assert_eq!(req.id, json!(1));
        assert!(req.params.is_null());
    }

    #[test]
    fn test_request_without_id() {
        let req: Request = serde_json::from_str(r#"{"op":"summary","params":{}}"#).unwrap();
        assert!(req.id.is_null());
        assert!(req.params.is_object());
    }

    #[test]
    fn test_success_line_omits_error() {
        let line = Response::success(json!("a"), json!({"x": 1})).to_line();
        assert!(line.contains("\"ok\":true"));
        assert!(!line.contains("\"error\""));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_error_line_omits_result() {
        let line = Response::error(json!(7), "unknown op: nope").to_line();
        assert!(line.contains("\"ok\":false"));
        assert!(line.contains("unknown op: nope"));
        assert!(!line.contains("\"result\""));
    }
}
