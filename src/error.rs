//! Error type shared by the transport, session and catalog layers.
//!
//! Every failure surfaces as an [`ApiError`]. Application errors reported by
//! the server carry a message template with `%1`, `%2`, ... placeholders that
//! are resolved against the positional parameters sent alongside it.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code reported by the server.
///
/// The admin API mixes numeric JSON-RPC codes with symbolic string codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Int(i64),
    Text(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Int(code) => write!(f, "{}", code),
            ErrorCode::Text(code) => f.write_str(code),
        }
    }
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Protocol,
    Application,
    FileIo,
}

/// Failure raised by any client operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required identity, endpoint or credential fields are missing.
    /// Detected before any network I/O.
    #[error("{0}")]
    Configuration(String),

    /// DNS resolution, connect or read failure.
    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Non-200 status line, malformed framing, or undecodable JSON body.
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        /// HTTP status code, when the status line could be parsed.
        status: Option<u16>,
    },

    /// JSON-RPC error returned by the server.
    #[error("{message}")]
    Application {
        /// Message with positional parameters already substituted.
        message: String,
        code: Option<ErrorCode>,
        positional_parameters: Vec<String>,
        /// Serialized request body that triggered the error.
        request: String,
        /// Raw response body.
        response: String,
    },

    /// Local file read or write failure during upload/download.
    #[error("{message}")]
    FileIo {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl ApiError {
    pub(crate) fn connection(message: impl Into<String>) -> Self {
        ApiError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn connection_io(message: impl Into<String>, source: std::io::Error) -> Self {
        ApiError::Connection {
            message: message.into(),
            source: Some(source),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        ApiError::Protocol {
            message: message.into(),
            status: None,
        }
    }

    /// Build an application error, resolving `%N` placeholders in `template`
    /// against `positional_parameters`.
    pub fn application(
        template: &str,
        code: Option<ErrorCode>,
        positional_parameters: Vec<String>,
        request: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        ApiError::Application {
            message: substitute_positional(template, &positional_parameters),
            code,
            positional_parameters,
            request: request.into(),
            response: response.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Configuration(_) => ErrorKind::Configuration,
            ApiError::Connection { .. } => ErrorKind::Connection,
            ApiError::Protocol { .. } => ErrorKind::Protocol,
            ApiError::Application { .. } => ErrorKind::Application,
            ApiError::FileIo { .. } => ErrorKind::FileIo,
        }
    }

    /// Server-supplied error code, if any.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            ApiError::Application { code, .. } => code.as_ref(),
            _ => None,
        }
    }

    /// HTTP status code carried by a protocol error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    pub fn positional_parameters(&self) -> &[String] {
        match self {
            ApiError::Application {
                positional_parameters,
                ..
            } => positional_parameters,
            _ => &[],
        }
    }

    /// Raw request captured for diagnostics.
    pub fn request(&self) -> Option<&str> {
        match self {
            ApiError::Application { request, .. } => Some(request),
            _ => None,
        }
    }

    /// Raw response captured for diagnostics.
    pub fn response(&self) -> Option<&str> {
        match self {
            ApiError::Application { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// Replace `%<digit>` placeholders with positional parameters.
///
/// Placeholders are numbered by order of first appearance, not by the digit
/// they carry: the first distinct placeholder takes `parameters[0]`, the
/// second distinct one takes `parameters[1]`, and so on. Repeated
/// occurrences of the same placeholder all receive the same value.
/// Placeholders without a matching parameter are left untouched.
pub fn substitute_positional(template: &str, parameters: &[String]) -> String {
    let mut seen: Vec<char> = Vec::new();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(digit) if digit.is_ascii_digit() => {
                chars.next();
                let index = match seen.iter().position(|d| *d == digit) {
                    Some(index) => index,
                    None => {
                        seen.push(digit);
                        seen.len() - 1
                    }
                };
                match parameters.get(index) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('%');
                        out.push(digit);
                    }
                }
            }
            _ => out.push('%'),
        }
    }

    out
}
