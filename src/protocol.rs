//! JSON line protocol spoken over stdin/stdout.
//!
//! One request per line:
//!
//! ```json
//! {"id": 7, "tool": "search", "args": {"query": "rust", "num_results": 5}}
//! ```
//!
//! and one response per line, echoing `id` and `tool`:
//!
//! ```json
//! {"id": 7, "tool": "search", "result": {"success": true, "results": []}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool names accepted by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Search,
    FetchUrl,
    GetAvailableEngines,
    ClearCache,
    Shutdown,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Self::Search,
        Self::FetchUrl,
        Self::GetAvailableEngines,
        Self::ClearCache,
        Self::Shutdown,
    ];

    /// Render the tool name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::FetchUrl => "fetch_url",
            Self::GetAvailableEngines => "get_available_engines",
            Self::ClearCache => "clear_cache",
            Self::Shutdown => "shutdown",
        }
    }

    /// Parse a tool name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }
}

fn empty_args() -> Value {
    Value::Object(Map::new())
}

/// One request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Caller-chosen correlation id, echoed back verbatim.
    #[serde(default)]
    pub id: Option<Value>,
    pub tool: String,
    #[serde(default = "empty_args")]
    pub args: Value,
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Option<Value>,
    pub tool: String,
    pub result: Value,
}

impl Response {
    /// Response for a line that is not a valid request.
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            id: None,
            tool: "parse-error".into(),
            result: serde_json::json!({
                "success": false,
                "error": message.into(),
            }),
        }
    }
}

fn default_engine() -> String {
    "auto".into()
}

/// Arguments of the `search` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    /// Falls back to the configured default when omitted.
    #[serde(default)]
    pub num_results: Option<usize>,
    #[serde(default = "default_engine")]
    pub engine: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(Tool::parse(tool.as_str()), Some(tool));
            let json = serde_json::to_string(&tool).expect("serialize");
            assert_eq!(json, format!("\"{}\"", tool.as_str()));
        }
        assert_eq!(Tool::parse("search_wikipedia"), None);
    }

    #[test]
    fn request_defaults_missing_id_and_args() {
        let request: Request = serde_json::from_str(r#"{"tool":"clear_cache"}"#).expect("parse");
        assert!(request.id.is_none());
        assert_eq!(request.args, serde_json::json!({}));
    }

    #[test]
    fn request_keeps_numeric_and_string_ids() {
        let request: Request =
            serde_json::from_str(r#"{"id":3,"tool":"search","args":{"query":"q"}}"#).expect("parse");
        assert_eq!(request.id, Some(serde_json::json!(3)));
        let request: Request =
            serde_json::from_str(r#"{"id":"abc","tool":"search"}"#).expect("parse");
        assert_eq!(request.id, Some(serde_json::json!("abc")));
    }

    #[test]
    fn search_args_defaults() {
        let args: SearchArgs = serde_json::from_value(serde_json::json!({"query": "rust"}))
            .expect("parse");
        assert_eq!(args.engine, "auto");
        assert!(args.num_results.is_none());
    }

    #[test]
    fn parse_error_shape() {
        let response = Response::parse_error("bad line");
        assert_eq!(response.tool, "parse-error");
        assert_eq!(response.result["success"], false);
        assert_eq!(response.result["error"], "bad line");
    }
}
