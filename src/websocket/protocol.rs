//! JSON-RPC 2.0 wire protocol.
//!
//! Defines the request/response frames and error codes of the `/` endpoint.
//! Server-initiated notifications reuse the envelope built by
//! [`baton_core::notification_envelope`].

use baton_core::{BatchReport, JSONRPC_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Invalid JSON was received
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error
pub const INTERNAL_ERROR: i64 = -32603;
/// At least one suite of a batch failed
pub const SUITES_FAILED: i64 = -32000;

/// Client → Server: method invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Protocol version, must be "2.0"
    pub jsonrpc: String,
    /// Request id. Absent or null for notifications, which get no response.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name (e.g. "run_all")
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, RpcError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)))?;
        if !value.is_object() {
            return Err(RpcError::new(INVALID_REQUEST, "Request must be an object"));
        }
        let request: Self = serde_json::from_value(value)
            .map_err(|e| RpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)))?;
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(RpcError::new(
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            ));
        }
        Ok(request)
    }
}

/// Server → Client: response to a request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    /// Always "2.0"
    pub jsonrpc: &'static str,
    /// Matches the request id, null when it could not be read
    pub id: Value,
    /// Successful result (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Build the response for a method outcome.
    pub fn from_result(id: Value, result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(value) => Self::ok(id, value),
            Err(error) => Self::err(id, error),
        }
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Structured error in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// JSON-RPC error code
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Extra detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Error with a code and message, no data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach the `data` member.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// `-32601` for a method outside the dispatch table.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    /// `-32602` for params of the wrong shape.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// Error for a settled batch with failed suites, keyed by suite name.
    pub fn suites_failed(report: &BatchReport) -> Self {
        let data: Map<String, Value> = report
            .failures()
            .map(|outcome| {
                let error = outcome.error.clone().unwrap_or_default();
                (outcome.suite.clone(), Value::String(error))
            })
            .collect();
        Self::new(SUITES_FAILED, "some suites failed").with_data(Value::Object(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let request =
            RpcRequest::parse(r#"{"jsonrpc": "2.0", "id": 7, "method": "run_all"}"#).unwrap();
        assert_eq!(request.id, Some(json!(7)));
        assert_eq!(request.method, "run_all");
        assert!(request.params.is_null());
    }

    #[test]
    fn test_notification_request_has_no_id() {
        let request =
            RpcRequest::parse(r#"{"jsonrpc": "2.0", "method": "ping", "params": []}"#).unwrap();
        assert!(request.id.is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(RpcRequest::parse("{not json").unwrap_err().code, PARSE_ERROR);
        assert_eq!(RpcRequest::parse("[1, 2]").unwrap_err().code, INVALID_REQUEST);
        assert_eq!(
            RpcRequest::parse(r#"{"jsonrpc": "2.0", "id": 1}"#).unwrap_err().code,
            INVALID_REQUEST
        );
        assert_eq!(
            RpcRequest::parse(r#"{"jsonrpc": "1.0", "id": 1, "method": "ping"}"#)
                .unwrap_err()
                .code,
            INVALID_REQUEST
        );
    }

    #[test]
    fn test_response_ok() {
        let text = RpcResponse::ok(json!(1), json!("ok")).to_text();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 1, "result": "ok"}));
    }

    #[test]
    fn test_response_err() {
        let text = RpcResponse::err(Value::Null, RpcError::method_not_found("nope")).to_text();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["error"]["code"], METHOD_NOT_FOUND);
        assert!(value["id"].is_null());
        assert!(value.get("result").is_none());
        assert!(value["error"].get("data").is_none());
    }

    #[test]
    fn test_error_constructors() {
        let error = RpcError::invalid_params("expected an object");
        assert_eq!(error.code, INVALID_PARAMS);
        assert_eq!(error.message, "expected an object");
        assert!(error.data.is_none());

        let error = RpcError::new(-1, "custom").with_data(json!({"a": 1}));
        assert_eq!(error.code, -1);
        assert_eq!(error.data, Some(json!({"a": 1})));
    }
}
