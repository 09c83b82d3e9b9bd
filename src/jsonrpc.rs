//! JSON-RPC envelope types for the admin API.
//!
//! Known envelope fields are typed; method-specific `params` and `result`
//! content stay as open [`serde_json::Value`] maps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;

/// Outgoing request envelope.
///
/// Field order matches the wire order expected by the server:
/// `jsonrpc`, `id`, `token`, `method`, `params`.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Build a request, dropping an empty token or empty params.
    pub fn new(
        version: &str,
        id: u64,
        token: Option<&str>,
        method: &str,
        params: Option<Value>,
    ) -> Self {
        Self {
            jsonrpc: version.to_string(),
            id,
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
            method: method.to_string(),
            params: params.filter(|p| !is_empty_value(p)),
        }
    }
}

/// Incoming response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Error member of either response shape.
///
/// Read field by field: a mistyped or null optional member must not hide
/// the server's message or code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcErrorObject {
    pub message: String,
    pub code: Option<ErrorCode>,
    pub message_parameters: MessageParameters,
}

impl RpcErrorObject {
    /// `parameters_at` is the JSON pointer to `messageParameters` within
    /// `value`.
    pub fn from_value(value: &Value, parameters_at: &str) -> Self {
        let message = match value.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let code = value
            .get("code")
            .and_then(|code| serde_json::from_value(code.clone()).ok());
        Self {
            message,
            code,
            message_parameters: MessageParameters::from_value(value.pointer(parameters_at)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageParameters {
    pub positional_parameters: Vec<Value>,
}

impl MessageParameters {
    /// Missing, null or non-array `positionalParameters` read as empty.
    pub fn from_value(value: Option<&Value>) -> Self {
        let positional_parameters = value
            .and_then(|v| v.get("positionalParameters"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Self {
            positional_parameters,
        }
    }

    /// Positional parameters rendered as plain strings.
    pub fn as_strings(&self) -> Vec<String> {
        self.positional_parameters
            .iter()
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// Error reported by the server in either response shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcFault {
    pub message: String,
    pub code: Option<ErrorCode>,
    pub positional_parameters: Vec<String>,
}

impl RpcResponse {
    /// Decode a response envelope from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                result: map.get("result").cloned(),
                error: map.get("error").cloned(),
            },
            _ => Self::default(),
        }
    }

    /// Session token carried by the first authenticated response.
    pub fn token(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.get("token"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }

    /// Detect an error in either response shape.
    ///
    /// A non-empty top-level `error` object wins; otherwise the first element
    /// of a non-empty `result.errors` array is reported.
    pub fn fault(&self) -> Option<RpcFault> {
        if let Some(error) = self.error.as_ref() {
            if is_empty_value(error) {
                return None;
            }
            let object = RpcErrorObject::from_value(error, "/data/messageParameters");
            let message = if object.message.is_empty() {
                error.to_string()
            } else {
                object.message
            };
            return Some(RpcFault {
                message,
                code: object.code,
                positional_parameters: object.message_parameters.as_strings(),
            });
        }

        let first = self
            .result
            .as_ref()
            .and_then(|r| r.get("errors"))
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())?;
        let entry = RpcErrorObject::from_value(first, "/messageParameters");
        Some(RpcFault {
            message: entry.message,
            code: entry.code,
            positional_parameters: entry.message_parameters.as_strings(),
        })
    }
}

/// Emptiness in the loose sense the server side uses: null, `false`, zero,
/// empty strings, arrays and objects are all "empty".
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
