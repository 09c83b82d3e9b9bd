//! Session client for the JSON-RPC admin API.
//!
//! `SessionClient` owns all session state (endpoint, application identity,
//! token, cookies, request counter). Every call takes `&mut self`, so one
//! client can only have a single request in flight.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use tokio_rustls::TlsConnector;
use tracing::{debug, info, trace};

use crate::error::ApiError;
use crate::jsonrpc::{is_empty_value, RpcRequest, RpcResponse};
use crate::session::endpoint::{Application, Endpoint};
use crate::session::request::{random_boundary, Credentials, HttpMethod, HttpRequest};
use crate::transport::{build_connector, HttpFrame, TransportOptions, TransportSocket};

/// Expected HTTP status for every exchange.
const HTTP_SERVER_OK: u16 = 200;

/// File name used by `download_file` when none is given.
const DEFAULT_DOWNLOAD_NAME: &str = "file.bin";

/// Part name used by `upload_file` when no reference id is given.
const DEFAULT_UPLOAD_PART: &str = "unknown";

/// Mutable per-session values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub hostname: String,
    pub token: Option<String>,
    /// Accumulated `" name=value;"` segments.
    pub cookies: String,
    /// Last request id handed out.
    pub request_id: u64,
}

impl SessionState {
    fn clean(&mut self) {
        if self.token.take().is_some() {
            debug!("Removing session token");
        }
        if !self.cookies.is_empty() {
            debug!("Removing cookies");
            self.cookies.clear();
        }
        self.hostname.clear();
    }

    fn next_id(&mut self) -> u64 {
        self.request_id += 1;
        self.request_id
    }

    fn append_cookie(&mut self, name: &str, value: &str) {
        debug!("Setting cookie {}", name);
        self.cookies.push_str(&format!(" {}={};", name, value));
    }
}

/// A successful HTTP exchange with its decoded JSON body, if any.
#[derive(Debug)]
struct Exchange {
    body: Vec<u8>,
    json: Option<Value>,
}

/// JSON-RPC client bound to one endpoint and one application identity.
///
/// # Example
///
/// ```ignore
/// use mailadmin_rpc::{Application, Endpoint, SessionClient};
///
/// let application = Application::new("Usage monitor", "Example Ltd.", "1.0")?;
/// let mut client = SessionClient::new(application, Endpoint::admin())?;
/// client.login("mail.example.com", "admin", "secret").await?;
/// let version = client.api_version().await?;
/// client.logout().await?;
/// ```
pub struct SessionClient {
    application: Application,
    endpoint: Endpoint,
    options: TransportOptions,
    state: SessionState,
    tls: Option<TlsConnector>,
}

impl SessionClient {
    pub fn new(application: Application, endpoint: Endpoint) -> Result<Self, ApiError> {
        let mut client = Self {
            application: Application::default(),
            endpoint: endpoint.clone(),
            options: TransportOptions::default(),
            state: SessionState::default(),
            tls: None,
        };
        client.configure_application(
            &application.name,
            &application.vendor,
            &application.version,
        )?;
        client.configure_endpoint(&endpoint.version, endpoint.port, &endpoint.path)?;
        Ok(client)
    }

    /// Record the application identity sent on login.
    pub fn configure_application(
        &mut self,
        name: &str,
        vendor: &str,
        version: &str,
    ) -> Result<(), ApiError> {
        let application = Application::new(name, vendor, version)?;
        debug!(
            "Registering application '{}' by '{}' version '{}'",
            name, vendor, version
        );
        self.application = application;
        Ok(())
    }

    /// Replace protocol version, port and base path.
    pub fn configure_endpoint(
        &mut self,
        version: &str,
        port: u16,
        path: &str,
    ) -> Result<(), ApiError> {
        let endpoint = Endpoint::new(version, port, path)?;
        debug!(
            "Registering JSON-RPC {} on {} using port {}",
            version, path, port
        );
        self.endpoint = endpoint;
        Ok(())
    }

    /// Toggle TLS on the connection (on by default).
    pub fn set_encryption(&mut self, encrypted: bool) {
        self.options.encrypted = encrypted;
    }

    /// Toggle server certificate verification (on by default).
    pub fn set_verify_certificates(&mut self, verify: bool) {
        if self.options.verify_certificates != verify {
            self.tls = None;
        }
        self.options.verify_certificates = verify;
    }

    /// Connect timeout for each request.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.connect_timeout = timeout;
    }

    /// Bound the read phase; `None` waits until the server closes.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.options.read_timeout = timeout;
    }

    /// Replace all socket-level settings at once.
    pub fn set_transport_options(&mut self, options: TransportOptions) {
        if self.options.verify_certificates != options.verify_certificates {
            self.tls = None;
        }
        self.options = options;
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.options
    }

    pub fn hostname(&self) -> &str {
        &self.state.hostname
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token.as_deref()
    }

    pub fn cookies(&self) -> &str {
        &self.state.cookies
    }

    /// Id of the most recent request, `0` before the first one.
    pub fn last_request_id(&self) -> u64 {
        self.state.request_id
    }

    /// Set the target host. A `host:port` or `[v6addr]:port` string also
    /// replaces the endpoint port; a bare IPv6 literal carries no port.
    pub fn set_hostname(&mut self, hostname: &str) -> Result<(), ApiError> {
        let invalid =
            || ApiError::Configuration(format!("Invalid port in hostname '{}'.", hostname));

        let (host, port) = if let Some(rest) = hostname.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            match tail {
                "" => (host, None),
                _ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else if hostname.matches(':').count() > 1 {
            (hostname, None)
        } else {
            match hostname.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (hostname, None),
            }
        };

        self.state.hostname = host.to_string();
        if let Some(port) = port {
            let port: u16 = port.parse().map_err(|_| invalid())?;
            let (version, path) = (self.endpoint.version.clone(), self.endpoint.path.clone());
            self.configure_endpoint(&version, port, &path)?;
        }
        Ok(())
    }

    /// Start a session and return the login result.
    pub async fn login(
        &mut self,
        hostname: &str,
        username: &str,
        password: &str,
    ) -> Result<Value, ApiError> {
        self.clean();

        if hostname.is_empty() {
            return Err(ApiError::Configuration(
                "Cannot login. Hostname not set.".to_string(),
            ));
        }
        if username.is_empty() {
            return Err(ApiError::Configuration(
                "Cannot login. Username not set.".to_string(),
            ));
        }
        if self.application.is_empty() {
            return Err(ApiError::Configuration(
                "Cannot login. Application not defined.".to_string(),
            ));
        }

        self.set_hostname(hostname)?;
        info!("Logging in to {} as {}", self.state.hostname, username);

        let params = json!({
            "userName": username,
            "password": password,
            "application": self.application,
        });
        self.send_request("Session.login", Some(params)).await
    }

    /// End the session. Local state is cleared even when the call fails.
    pub async fn logout(&mut self) -> Result<Value, ApiError> {
        let result = self.send_request("Session.logout", None).await;
        self.clean();
        result
    }

    /// Drop token, cookies and host without any network I/O.
    pub fn clean(&mut self) {
        self.state.clean();
    }

    /// `Version.getApiVersion`.
    pub async fn api_version(&mut self) -> Result<i64, ApiError> {
        let result = self.send_request("Version.getApiVersion", None).await?;
        result
            .get("apiVersion")
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::protocol("Response is missing apiVersion"))
    }

    /// Call `method` and return the `result` member of the reply
    /// (`Value::Null` when absent).
    pub async fn send_request(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, ApiError> {
        let id = self.state.next_id();
        let request = RpcRequest::new(
            &self.endpoint.version,
            id,
            self.state.token.as_deref(),
            method,
            params,
        );
        let payload = serde_json::to_vec(&request)
            .map_err(|e| ApiError::protocol(format!("Failed to serialize request: {}", e)))?;
        debug!("→ {} (id {})", method, id);

        let exchange = self.send(HttpMethod::Post, &payload).await?;
        Ok(extract_result(exchange.json))
    }

    /// Send a pre-built JSON body and return the raw response body.
    pub async fn send_request_raw(&mut self, payload: &str) -> Result<String, ApiError> {
        let exchange = self.send(HttpMethod::Post, payload.as_bytes()).await?;
        Ok(String::from_utf8_lossy(&exchange.body).into_owned())
    }

    /// Upload a local file and return the `result` member of the reply.
    ///
    /// `reference_id` names the multipart part; it defaults to `"unknown"`.
    pub async fn upload_file(
        &mut self,
        path: impl AsRef<Path>,
        reference_id: Option<&str>,
    ) -> Result<Value, ApiError> {
        let path = path.as_ref();
        let data = match tokio::fs::read(path).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) => {
                return Err(ApiError::FileIo {
                    message: format!("Unable to open file {}", path.display()),
                    path: path.to_path_buf(),
                    source: None,
                })
            }
            Err(e) => {
                return Err(ApiError::FileIo {
                    message: format!("Unable to open file {}", path.display()),
                    path: path.to_path_buf(),
                    source: Some(e),
                })
            }
        };

        debug!("Uploading file {} ({} bytes)", path.display(), data.len());
        let part = reference_id.unwrap_or(DEFAULT_UPLOAD_PART).to_string();
        let exchange = self.send_upload(&data, &part).await?;
        Ok(extract_result(exchange.json))
    }

    /// Download `url` into `directory`, returning the written path.
    pub async fn download_file(
        &mut self,
        url: &str,
        directory: impl AsRef<Path>,
        filename: Option<&str>,
    ) -> Result<PathBuf, ApiError> {
        let save_as = directory
            .as_ref()
            .join(filename.filter(|f| !f.is_empty()).unwrap_or(DEFAULT_DOWNLOAD_NAME));

        let exchange = self.send(HttpMethod::Get, url.as_bytes()).await?;

        debug!("Saving file {}", save_as.display());
        tokio::fs::write(&save_as, &exchange.body)
            .await
            .map_err(|e| ApiError::FileIo {
                message: format!("Unable to save file {}", save_as.display()),
                path: save_as.clone(),
                source: Some(e),
            })?;
        Ok(save_as)
    }

    async fn send_upload(&mut self, data: &[u8], part: &str) -> Result<Exchange, ApiError> {
        let boundary = random_boundary();
        let request = HttpRequest::put(&self.endpoint.upload_path(), data, part, &boundary);
        self.dispatch(HttpMethod::Put, request, data).await
    }

    async fn send(&mut self, method: HttpMethod, data: &[u8]) -> Result<Exchange, ApiError> {
        let request = match method {
            HttpMethod::Post => HttpRequest::post(&self.endpoint.path, data),
            HttpMethod::Get => HttpRequest::get(&String::from_utf8_lossy(data)),
            HttpMethod::Put => {
                return self.send_upload(data, DEFAULT_UPLOAD_PART).await;
            }
        };
        self.dispatch(method, request, data).await
    }

    /// Frame, transmit and interpret one request.
    async fn dispatch(
        &mut self,
        method: HttpMethod,
        request: HttpRequest,
        data: &[u8],
    ) -> Result<Exchange, ApiError> {
        if self.state.hostname.is_empty() {
            return Err(ApiError::Configuration(
                "Cannot send data before login.".to_string(),
            ));
        }

        let credentials = self.state.token.as_deref().map(|token| Credentials {
            cookies: &self.state.cookies,
            token,
        });
        let request = request
            .with_common_headers(&self.endpoint.host_header(&self.state.hostname), credentials);
        let wire = request.to_bytes();
        trace!("Raw request:\n{}", String::from_utf8_lossy(&wire));

        let tls = self.tls_connector()?;
        let mut socket = TransportSocket::open(
            &self.state.hostname,
            self.endpoint.port,
            self.options.clone(),
            tls.as_ref(),
        )
        .await;
        let frame = socket.send(&wire).await;
        socket.close();
        let frame = frame?;
        trace!(
            "Raw response:\n{}\r\n\r\n{}",
            frame.headers,
            String::from_utf8_lossy(&frame.body)
        );

        self.interpret(method, frame, data)
    }

    fn tls_connector(&mut self) -> Result<Option<TlsConnector>, ApiError> {
        if !self.options.encrypted {
            return Ok(None);
        }
        if self.tls.is_none() {
            self.tls = Some(build_connector(self.options.verify_certificates)?);
        }
        Ok(self.tls.clone())
    }

    /// Validate the status line, decode the body, adopt the token and
    /// cookies, and surface server-side errors.
    fn interpret(
        &mut self,
        method: HttpMethod,
        frame: HttpFrame,
        data: &[u8],
    ) -> Result<Exchange, ApiError> {
        let status = frame.status_line().ok_or_else(|| ApiError::Protocol {
            message: format!(
                "Malformed HTTP status line from remote server {}",
                self.target_url()
            ),
            status: None,
        })?;
        if status.code != HTTP_SERVER_OK {
            return Err(ApiError::Protocol {
                message: format!(
                    "{} - {} on remote server {}",
                    status.code,
                    status.reason,
                    self.target_url()
                ),
                status: Some(status.code),
            });
        }

        let json: Option<Value> = serde_json::from_slice(&frame.body).ok();
        if method == HttpMethod::Post && json.as_ref().map_or(true, is_empty_value) {
            return Err(ApiError::protocol(
                "Invalid JSON data, cannot parse response.",
            ));
        }

        if let Some(value) = json.as_ref() {
            let response = RpcResponse::from_value(value);

            if self.state.token.is_none() {
                if let Some(token) = response.token() {
                    debug!("Setting session token");
                    self.state.token = Some(token.to_string());
                }
            }

            if let Some(fault) = response.fault() {
                return Err(ApiError::application(
                    &fault.message,
                    fault.code,
                    fault.positional_parameters,
                    String::from_utf8_lossy(data),
                    frame.body_text(),
                ));
            }
        }

        if self.state.cookies.is_empty() {
            for (name, value) in frame.set_cookies() {
                self.state.append_cookie(&name, &value);
            }
        }

        Ok(Exchange {
            body: frame.body,
            json,
        })
    }

    fn target_url(&self) -> String {
        self.endpoint
            .target_url(&self.state.hostname, self.options.encrypted)
    }
}

fn extract_result(json: Option<Value>) -> Value {
    match json {
        Some(Value::Object(mut map)) => map.remove("result").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
