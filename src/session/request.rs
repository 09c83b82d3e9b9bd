//! Outbound HTTP request framing.
//!
//! Headers are kept as an ordered list: the method-specific set first, then
//! the common set (`Host`, `Content-Length`, `Connection`, and once a token
//! exists `Cookie` and `X-Token`). Lines are CRLF terminated.

use std::fmt;

const CRLF: &str = "\r\n";

/// User agent announced on JSON-RPC calls.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "X-Token";

/// HTTP methods used by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// JSON-RPC call.
    Post,
    /// File download.
    Get,
    /// Multipart file upload.
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Post => "POST",
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
        })
    }
}

/// Session values attached to authenticated requests.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub cookies: &'a str,
    pub token: &'a str,
}

/// A fully framed request ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    request_line: String,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// JSON-RPC call. CR, LF and TAB are stripped from the payload so the
    /// body travels as a single line.
    pub fn post(path: &str, json: &[u8]) -> Self {
        let mut body: Vec<u8> = json
            .iter()
            .copied()
            .filter(|b| !matches!(b, b'\r' | b'\n' | b'\t'))
            .collect();
        body.extend_from_slice(CRLF.as_bytes());

        Self {
            request_line: format!("POST {} HTTP/1.1", path),
            headers: vec![
                ("Accept", "application/json-rpc".to_string()),
                ("Content-Type", "application/json-rpc; charset=UTF-8".to_string()),
                ("User-Agent", USER_AGENT.to_string()),
            ],
            body,
        }
    }

    /// Download of `url`. The URL is echoed as the body.
    pub fn get(url: &str) -> Self {
        Self {
            request_line: format!("GET {} HTTP/1.1", url),
            headers: vec![("Accept", "*/*".to_string())],
            body: format!("{}{}", url, CRLF).into_bytes(),
        }
    }

    /// Multipart upload of `data` as a single part named `part_name`.
    ///
    /// The server's upload handler accepts form posts, so the request goes
    /// out as `POST <path>upload/`.
    pub fn put(upload_path: &str, data: &[u8], part_name: &str, boundary: &str) -> Self {
        let mut body = Vec::with_capacity(data.len() + 256);
        body.extend_from_slice(format!("--{}{}", boundary, CRLF).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"newFile.bin\"{}",
                part_name, CRLF
            )
            .as_bytes(),
        );
        body.extend_from_slice(CRLF.as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(CRLF.as_bytes());
        body.extend_from_slice(format!("--{}--{}", boundary, CRLF).as_bytes());

        Self {
            request_line: format!("POST {} HTTP/1.1", upload_path),
            headers: vec![
                ("Accept", "*/*".to_string()),
                (
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", boundary),
                ),
            ],
            body,
        }
    }

    /// Append the common header set.
    pub fn with_common_headers(mut self, host: &str, credentials: Option<Credentials<'_>>) -> Self {
        self.headers.push(("Host", host.to_string()));
        self.headers.push(("Content-Length", self.body.len().to_string()));
        self.headers.push(("Connection", "close".to_string()));
        if let Some(credentials) = credentials {
            self.headers
                .push(("Cookie", credentials.cookies.trim_start().to_string()));
            self.headers.push((TOKEN_HEADER, credentials.token.to_string()));
        }
        self
    }

    pub fn request_line(&self) -> &str {
        &self.request_line
    }

    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Wire bytes: request line, headers in insertion order, blank line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = String::with_capacity(256);
        head.push_str(&self.request_line);
        head.push_str(CRLF);
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str(CRLF);
        }
        head.push_str(CRLF);

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Random multipart boundary: 21 dashes followed by 10 hex digits.
pub fn random_boundary() -> String {
    let bytes: [u8; 5] = rand::random();
    let suffix: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("---------------------{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_post_framing_order() {
        let request = HttpRequest::post("/admin/api/jsonrpc/", b"{\"id\":1}")
            .with_common_headers("mail.example.com:4040", None);
        let wire = String::from_utf8(request.to_bytes()).unwrap();
        let expected = format!(
            "POST /admin/api/jsonrpc/ HTTP/1.1\r\n\
             Accept: application/json-rpc\r\n\
             Content-Type: application/json-rpc; charset=UTF-8\r\n\
             User-Agent: {}\r\n\
             Host: mail.example.com:4040\r\n\
             Content-Length: 10\r\n\
             Connection: close\r\n\
             \r\n\
             {{\"id\":1}}\r\n",
            USER_AGENT
        );
        assert_eq!(wire, expected);
    }

    #[test]
    fn test_post_strips_line_breaks_and_tabs() {
        let request = HttpRequest::post("/", b"{\r\n\t\"a\": 1\n}\r");
        assert_eq!(request.body(), b"{\"a\": 1}\r\n");
    }

    #[test]
    fn test_credentials_appended_last() {
        let credentials = Credentials {
            cookies: " a=1; b=2;",
            token: "tok",
        };
        let request = HttpRequest::post("/", b"{}").with_common_headers("h", Some(credentials));
        let names: Vec<&str> = request.headers().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            vec![
                "Accept",
                "Content-Type",
                "User-Agent",
                "Host",
                "Content-Length",
                "Connection",
                "Cookie",
                "X-Token"
            ]
        );
        assert_eq!(request.header("cookie"), Some("a=1; b=2;"));
        assert_eq!(request.header("X-Token"), Some("tok"));
    }

    #[test]
    fn test_get_framing() {
        let request = HttpRequest::get("/admin/api/download/export.csv")
            .with_common_headers("mail.example.com:4040", None);
        assert_eq!(
            request.request_line(),
            "GET /admin/api/download/export.csv HTTP/1.1"
        );
        assert_eq!(request.header("Accept"), Some("*/*"));
        assert_eq!(request.body(), b"/admin/api/download/export.csv\r\n");
        assert_eq!(request.header("Content-Length"), Some("32"));
    }

    #[test]
    fn test_put_multipart_layout() {
        let boundary = "---------------------0123456789";
        let request = HttpRequest::put("/admin/api/jsonrpc/upload/", b"PAYLOAD", "unknown", boundary);
        assert_eq!(request.request_line(), "POST /admin/api/jsonrpc/upload/ HTTP/1.1");
        assert_eq!(
            request.header("Content-Type"),
            Some("multipart/form-data; boundary=---------------------0123456789")
        );

        let body = String::from_utf8(request.body().to_vec()).unwrap();
        assert_eq!(
            body,
            "-----------------------0123456789\r\n\
             Content-Disposition: form-data; name=\"unknown\"; filename=\"newFile.bin\"\r\n\
             \r\n\
             PAYLOAD\r\n\
             -----------------------0123456789--\r\n"
        );
    }

    #[test]
    fn test_random_boundary_shape() {
        let boundary = random_boundary();
        assert_eq!(boundary.len(), 31);
        assert!(boundary.starts_with("---------------------"));
        assert!(boundary[21..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Post.to_string(), "POST");
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Put.to_string(), "PUT");
    }
}
