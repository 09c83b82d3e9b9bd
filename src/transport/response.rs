//! Parsing of raw HTTP/1.1 responses read from the socket.

use crate::transport::chunked::{decode_chunked, ChunkError};

/// A response split into its header block and (de-chunked) body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpFrame {
    /// Status line and header lines, CRLF separated, without the blank line.
    pub headers: String,
    pub body: Vec<u8>,
}

impl HttpFrame {
    /// Split a raw response at the first blank line and undo chunked
    /// transfer encoding when the headers announce it.
    pub fn parse(raw: &[u8]) -> Result<Self, ChunkError> {
        let (head, body) = match raw.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(split) => (&raw[..split], &raw[split + 4..]),
            None => (raw, &raw[raw.len()..]),
        };
        let headers = String::from_utf8_lossy(head).into_owned();

        let body = if is_chunked(&headers) {
            decode_chunked(body)?
        } else {
            body.to_vec()
        };

        Ok(Self { headers, body })
    }

    pub fn status_line(&self) -> Option<StatusLine> {
        self.headers.lines().next().and_then(StatusLine::parse)
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    /// `name=value` pairs from every `Set-Cookie` header, in order.
    pub fn set_cookies(&self) -> Vec<(String, String)> {
        self.headers
            .lines()
            .skip(1)
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                if !key.trim().eq_ignore_ascii_case("Set-Cookie") {
                    return None;
                }
                parse_cookie_pair(value)
            })
            .collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Parsed `HTTP/<major>.<minor> <code> <reason>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub major: u32,
    pub minor: u32,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_end_matches('\r').strip_prefix("HTTP/")?;
        let (version, rest) = rest.split_once(' ')?;
        let (major, minor) = version.split_once('.')?;
        let (code, reason) = match rest.split_once(' ') {
            Some((code, reason)) => (code, reason),
            None => (rest, ""),
        };
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            major: parse_digits(major)?,
            minor: parse_digits(minor)?,
            code: code.parse().ok()?,
            reason: reason.trim().to_string(),
        })
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_chunked(headers: &str) -> bool {
    headers.lines().skip(1).any(|line| {
        line.split_once(':').is_some_and(|(key, value)| {
            key.trim().eq_ignore_ascii_case("transfer-encoding")
                && value
                    .split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        })
    })
}

fn parse_cookie_pair(value: &str) -> Option<(String, String)> {
    let pair = value.trim_start().split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    let value = value.split(char::is_whitespace).next().unwrap_or_default();
    Some((name.to_string(), value.to_string()))
}
