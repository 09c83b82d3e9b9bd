//! Integration tests for the session client against a scripted HTTP server.
//!
//! The fake server listens on loopback, answers each real request with the
//! next canned response, and skips the empty reachability probes the
//! transport makes before every send. Encryption is disabled throughout.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use mailadmin_rpc::admin::AdminApi;
use mailadmin_rpc::transport::TransportOptions;
use mailadmin_rpc::{Application, Endpoint, ErrorCode, ErrorKind, SessionClient};

/// One request as received by the fake server.
#[derive(Debug)]
struct Captured {
    head: String,
    body: Vec<u8>,
}

impl Captured {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

struct FakeServer {
    host: String,
    port: u16,
    requests: mpsc::UnboundedReceiver<Captured>,
}

impl FakeServer {
    async fn next_request(&mut self) -> Captured {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("server saw no request")
            .expect("server stopped")
    }
}

/// Serve `responses` in order, one per real connection.
async fn fake_server(responses: Vec<Vec<u8>>) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for response in responses {
            loop {
                let (mut conn, _) = listener.accept().await.unwrap();
                let Some(captured) = read_request(&mut conn).await else {
                    continue;
                };
                let _ = tx.send(captured);
                conn.write_all(&response).await.unwrap();
                conn.shutdown().await.unwrap();
                break;
            }
        }
    });

    FakeServer {
        host: format!("127.0.0.1:{}", port),
        port,
        requests: rx,
    }
}

/// Read headers plus `Content-Length` bytes; `None` for an empty probe.
async fn read_request(conn: &mut TcpStream) -> Option<Captured> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    let split = loop {
        let n = conn.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let length: usize = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case("Content-Length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    let mut body = raw[split + 4..].to_vec();
    while body.len() < length {
        let n = conn.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }

    Some(Captured { head, body })
}

fn ok(body: &str) -> Vec<u8> {
    ok_with_headers(body, "")
}

fn ok_with_headers(body: &str, headers: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json-rpc\r\n{}Content-Length: {}\r\n\r\n{}",
        headers,
        body.len(),
        body
    )
    .into_bytes()
}

fn login_ok(token: &str) -> Vec<u8> {
    ok(&json!({"jsonrpc": "2.0", "id": 1, "result": {"token": token}}).to_string())
}

fn client() -> SessionClient {
    let application = Application::new("Usage monitor", "Example Ltd.", "1.0").unwrap();
    let mut client = SessionClient::new(application, Endpoint::admin()).unwrap();
    client.set_transport_options(TransportOptions {
        encrypted: false,
        ..Default::default()
    });
    client
}

#[tokio::test]
async fn test_login_adopts_token_and_cookies() {
    let mut server = fake_server(vec![
        ok_with_headers(
            &json!({"jsonrpc": "2.0", "id": 1, "result": {"token": "tok-1"}}).to_string(),
            "Set-Cookie: SESSION_CONNECT_WEBADMIN=abc123; path=/; Secure\r\n\
             set-cookie: TOKEN_CONNECT_WEBADMIN=xyz; HttpOnly\r\n",
        ),
        ok(&json!({"jsonrpc": "2.0", "id": 2, "result": {"apiVersion": 3}}).to_string()),
        ok(&json!({"jsonrpc": "2.0", "id": 3, "result": {}}).to_string()),
    ])
    .await;

    let mut client = client();
    let result = client.login(&server.host, "admin", "secret").await.unwrap();
    assert_eq!(result, json!({"token": "tok-1"}));
    assert_eq!(client.hostname(), "127.0.0.1");
    assert_eq!(client.endpoint().port, server.port);
    assert_eq!(client.token(), Some("tok-1"));
    assert_eq!(
        client.cookies(),
        " SESSION_CONNECT_WEBADMIN=abc123; TOKEN_CONNECT_WEBADMIN=xyz;"
    );

    let login = server.next_request().await;
    assert_eq!(login.request_line(), "POST /admin/api/jsonrpc/ HTTP/1.1");
    assert_eq!(login.header("Host"), Some(format!("127.0.0.1:{}", server.port)));
    assert_eq!(login.header("Connection").as_deref(), Some("close"));
    assert_eq!(login.header("X-Token"), None);
    assert_eq!(login.header("Cookie"), None);
    assert!(login.body.ends_with(b"\r\n"));
    let body = login.json();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);
    assert_eq!(body["method"], "Session.login");
    assert_eq!(body.get("token"), None);
    assert_eq!(body["params"]["userName"], "admin");
    assert_eq!(body["params"]["application"]["vendor"], "Example Ltd.");

    assert_eq!(client.api_version().await.unwrap(), 3);
    let version = server.next_request().await;
    assert_eq!(version.header("X-Token").as_deref(), Some("tok-1"));
    assert_eq!(
        version.header("Cookie").as_deref(),
        Some("SESSION_CONNECT_WEBADMIN=abc123; TOKEN_CONNECT_WEBADMIN=xyz;")
    );
    let body = version.json();
    assert_eq!(body["id"], 2);
    assert_eq!(body["token"], "tok-1");
    assert_eq!(body.get("params"), None);

    client.logout().await.unwrap();
    let logout = server.next_request().await;
    assert_eq!(logout.json()["id"], 3);
    assert_eq!(logout.json()["method"], "Session.logout");

    assert_eq!(client.token(), None);
    assert_eq!(client.cookies(), "");
    assert_eq!(client.hostname(), "");
    assert_eq!(client.last_request_id(), 3);
}

#[tokio::test]
async fn test_later_cookies_do_not_replace_the_jar() {
    let mut server = fake_server(vec![
        ok_with_headers(
            &json!({"result": {"token": "tok"}}).to_string(),
            "Set-Cookie: first=1\r\n",
        ),
        ok_with_headers(&json!({"result": {}}).to_string(), "Set-Cookie: second=2\r\n"),
    ])
    .await;

    let mut client = client();
    client.login(&server.host, "admin", "secret").await.unwrap();
    client.send_request("Server.getInfo", None).await.unwrap();
    assert_eq!(client.cookies(), " first=1;");
    server.next_request().await;
    server.next_request().await;
}

#[tokio::test]
async fn test_http_error_status() {
    let server = fake_server(vec![
        b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_vec(),
    ])
    .await;

    let mut client = client();
    let err = client.login(&server.host, "admin", "secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(err.status(), Some(404));
    assert_eq!(
        err.to_string(),
        format!(
            "Protocol error: 404 - Not Found on remote server http://127.0.0.1:{}/admin/api/jsonrpc/",
            server.port
        )
    );
}

#[tokio::test]
async fn test_application_error_substitutes_parameters() {
    let response = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {
            "code": -32001,
            "message": "User %1 cannot log in from %2.",
            "data": {"messageParameters": {"positionalParameters": ["admin", "10.0.0.1"]}}
        }
    })
    .to_string();
    let server = fake_server(vec![ok(&response)]).await;

    let mut client = client();
    let err = client.login(&server.host, "admin", "secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.to_string(), "User admin cannot log in from 10.0.0.1.");
    assert_eq!(err.code(), Some(&ErrorCode::Int(-32001)));
    assert_eq!(err.positional_parameters(), ["admin", "10.0.0.1"]);
    assert!(err.request().unwrap().contains("\"Session.login\""));
    assert_eq!(err.response(), Some(response.as_str()));
}

#[tokio::test]
async fn test_result_errors_shape() {
    let server = fake_server(vec![
        login_ok("tok"),
        ok(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "errors": [{
                    "code": 1000,
                    "inputIndex": 0,
                    "message": "Alias %1 already exists.",
                    "messageParameters": {"positionalParameters": ["info"]}
                }],
                "result": []
            }
        })
        .to_string()),
    ])
    .await;

    let mut client = client();
    client.login(&server.host, "admin", "secret").await.unwrap();
    let err = client
        .send_request("Aliases.create", Some(json!({"aliases": []})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.to_string(), "Alias info already exists.");
    assert_eq!(err.code(), Some(&ErrorCode::Int(1000)));
}

#[tokio::test]
async fn test_invalid_json_is_protocol_error() {
    let server = fake_server(vec![ok("<html>maintenance</html>")]).await;

    let mut client = client();
    let err = client.login(&server.host, "admin", "secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(
        err.to_string(),
        "Protocol error: Invalid JSON data, cannot parse response."
    );
}

#[tokio::test]
async fn test_chunked_response() {
    let body = json!({"jsonrpc": "2.0", "id": 1, "result": {"token": "chunky"}}).to_string();
    let (first, second) = body.split_at(10);
    let response = format!(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{}\r\n{:x}\r\n{}\r\n0\r\n\r\n",
        first.len(),
        first,
        second.len(),
        second
    );
    let server = fake_server(vec![response.into_bytes()]).await;

    let mut client = client();
    client.login(&server.host, "admin", "secret").await.unwrap();
    assert_eq!(client.token(), Some("chunky"));
}

#[tokio::test]
async fn test_login_validates_before_any_io() {
    let mut client = client();

    let err = client.login("", "admin", "secret").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.to_string(), "Cannot login. Hostname not set.");

    let err = client.login("mail.example.com", "", "secret").await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot login. Username not set.");
    assert_eq!(client.last_request_id(), 0);
}

#[tokio::test]
async fn test_send_before_login() {
    let mut client = client();
    let err = client.send_request("Domains.get", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.to_string(), "Cannot send data before login.");
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut client = client();
    let err = client
        .login(&format!("127.0.0.1:{}", port), "admin", "secret")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(
        err.to_string(),
        format!("Connection failed: Cannot connect to 127.0.0.1 using port {}.", port)
    );
}

#[tokio::test]
async fn test_upload_file_multipart() {
    let mut server = fake_server(vec![
        login_ok("tok"),
        ok(&json!({"result": {"id": "upload-1"}}).to_string()),
    ])
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("certificate.pem");
    std::fs::write(&path, b"-----BEGIN CERTIFICATE-----").unwrap();

    let mut client = client();
    client.login(&server.host, "admin", "secret").await.unwrap();
    server.next_request().await;

    let result = client.upload_file(&path, Some("ref-7")).await.unwrap();
    assert_eq!(result, json!({"id": "upload-1"}));

    let upload = server.next_request().await;
    assert_eq!(upload.request_line(), "POST /admin/api/jsonrpc/upload/ HTTP/1.1");
    assert_eq!(upload.header("X-Token").as_deref(), Some("tok"));

    let content_type = upload.header("Content-Type").unwrap();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .unwrap()
        .to_string();
    assert_eq!(boundary.len(), 31);
    assert!(boundary.starts_with(&"-".repeat(21)));

    let expected = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"ref-7\"; filename=\"newFile.bin\"\r\n\r\n\
         -----BEGIN CERTIFICATE-----\r\n--{b}--\r\n",
        b = boundary
    );
    assert_eq!(String::from_utf8_lossy(&upload.body), expected);
}

#[tokio::test]
async fn test_upload_empty_file_is_file_error() {
    let server = fake_server(vec![login_ok("tok")]).await;
    let file = tempfile::NamedTempFile::new().unwrap();

    let mut client = client();
    client.login(&server.host, "admin", "secret").await.unwrap();
    let err = client.upload_file(file.path(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileIo);
    assert!(err.to_string().starts_with("Unable to open file"));
}

#[tokio::test]
async fn test_download_file() {
    let csv = "login,size\njdoe,2048\n";
    let mut server = fake_server(vec![
        login_ok("tok"),
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: {}\r\n\r\n{}",
            csv.len(),
            csv
        )
        .into_bytes(),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();

    let mut client = client();
    client.login(&server.host, "admin", "secret").await.unwrap();
    server.next_request().await;

    let saved = client
        .download_file("/admin/api/download/report.csv", dir.path(), None)
        .await
        .unwrap();
    assert_eq!(saved, dir.path().join("file.bin"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), csv);

    let download = server.next_request().await;
    assert_eq!(
        download.request_line(),
        "GET /admin/api/download/report.csv HTTP/1.1"
    );
    assert_eq!(download.header("Accept").as_deref(), Some("*/*"));
}

#[tokio::test]
async fn test_top_users_report_query() {
    let mut server = fake_server(vec![
        login_ok("tok"),
        ok(&json!({
            "result": {
                "list": [{"id": "keriodb://domain/1", "name": "example.com"}],
                "totalItems": 1
            }
        })
        .to_string()),
        ok(&json!({
            "result": {
                "list": [{
                    "loginName": "jdoe",
                    "fullName": "John Doe",
                    "consumedSize": {"value": 3, "units": "KiloBytes"}
                }],
                "totalItems": 1
            }
        })
        .to_string()),
    ])
    .await;

    let mut client = client();
    client.login(&server.host, "admin", "secret").await.unwrap();
    server.next_request().await;

    let mut api = AdminApi::new(&mut client);
    let domains = api.domains(&["id", "name"]).await.unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].name, "example.com");

    let page = api.top_users_by_usage(&domains[0].id, 5).await.unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.list[0].address("example.com"), "jdoe@example.com");
    assert_eq!(page.list[0].consumed_size.unwrap().bytes(), Some(3072));

    let domains_request = server.next_request().await.json();
    assert_eq!(domains_request["method"], "Domains.get");
    assert_eq!(domains_request["params"]["query"]["fields"], json!(["id", "name"]));

    let users_request = server.next_request().await.json();
    assert_eq!(users_request["method"], "Users.get");
    assert_eq!(users_request["params"]["domainId"], "keriodb://domain/1");
    assert_eq!(users_request["params"]["query"]["limit"], 5);
}
