//! One-shot socket used for a single HTTP exchange.
//!
//! A `TransportSocket` is opened per request, writes the raw request, reads
//! until the peer closes, and is dropped afterwards. Dropping it closes the
//! connection, so every exit path releases the handle.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::transport::response::HttpFrame;
use crate::transport::tls;

/// Read buffer size per socket read.
const BUFFER_SIZE: usize = 5120;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Socket-level settings shared by every request of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Wrap the connection in TLS.
    pub encrypted: bool,
    /// Verify the server certificate against the platform roots.
    pub verify_certificates: bool,
    pub connect_timeout: Duration,
    /// Upper bound for the whole read phase; `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            encrypted: true,
            verify_certificates: true,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: None,
        }
    }
}

enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Connection::Plain(stream) => write_and_flush(stream, data).await,
            Connection::Tls(stream) => write_and_flush(stream.as_mut(), data).await,
        }
    }

    async fn read_to_close(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Connection::Plain(stream) => read_until_eof(stream).await,
            Connection::Tls(stream) => read_until_eof(stream.as_mut()).await,
        }
    }
}

async fn write_and_flush<S: AsyncWrite + Unpin>(stream: &mut S, data: &[u8]) -> io::Result<()> {
    stream.write_all(data).await?;
    stream.flush().await
}

async fn read_until_eof<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<Vec<u8>> {
    let mut response = Vec::new();
    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        match stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&buffer[..n]),
            // Servers frequently close TLS without close_notify once the
            // response is complete.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !response.is_empty() => break,
            Err(e) => return Err(e),
        }
    }
    Ok(response)
}

/// Blocking-per-call connection to `hostname:port`.
pub struct TransportSocket {
    hostname: String,
    port: u16,
    options: TransportOptions,
    stream: Option<Connection>,
    error_code: i32,
    error_message: String,
}

impl TransportSocket {
    /// Open a connection.
    ///
    /// Never fails: a connect error is recorded and surfaces only when the
    /// socket is used. `tls` must be provided when `options.encrypted` is set.
    pub async fn open(
        hostname: &str,
        port: u16,
        options: TransportOptions,
        tls: Option<&TlsConnector>,
    ) -> Self {
        let mut socket = Self {
            hostname: hostname.to_string(),
            port,
            options,
            stream: None,
            error_code: 0,
            error_message: String::new(),
        };

        match socket.connect(tls).await {
            Ok(connection) => socket.stream = Some(connection),
            Err(e) => {
                debug!("Connect to {}:{} failed: {}", socket.hostname, socket.port, e);
                socket.record_error(&e);
            }
        }

        socket
    }

    async fn connect(&self, tls: Option<&TlsConnector>) -> io::Result<Connection> {
        let tcp = self.tcp_connect().await?;
        if !self.options.encrypted {
            return Ok(Connection::Plain(tcp));
        }

        let connector = tls.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "TLS requested without a connector")
        })?;
        let server_name = tls::server_name(&self.hostname)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let handshake = connector.connect(server_name, tcp);
        let stream = timeout(self.options.connect_timeout, handshake)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))??;
        Ok(Connection::Tls(Box::new(stream)))
    }

    async fn tcp_connect(&self) -> io::Result<TcpStream> {
        let connect = TcpStream::connect((self.hostname.as_str(), self.port));
        timeout(self.options.connect_timeout, connect)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connection timed out"))?
    }

    fn record_error(&mut self, error: &io::Error) {
        self.error_code = error.raw_os_error().unwrap_or(-1);
        self.error_message = error.to_string();
    }

    /// Probe reachability, write `data` in full and read the response.
    pub async fn send(&mut self, data: &[u8]) -> Result<HttpFrame, ApiError> {
        if !self.check_connection().await {
            return Err(ApiError::Connection {
                message: format!(
                    "Cannot connect to {} using port {}.",
                    self.hostname, self.port
                ),
                source: None,
            });
        }

        let stream = self.stream.as_mut().ok_or_else(|| {
            ApiError::connection("Cannot read data from server, connection timeout.")
        })?;
        stream
            .write_all(data)
            .await
            .map_err(|e| ApiError::connection_io("Cannot write request to server", e))?;
        trace!("Wrote {} bytes to {}:{}", data.len(), self.hostname, self.port);

        self.read().await
    }

    /// Read until the peer closes and split the response.
    pub async fn read(&mut self) -> Result<HttpFrame, ApiError> {
        let read_timeout = self.options.read_timeout;
        let stream = self.stream.as_mut().ok_or_else(|| {
            ApiError::connection("Cannot read data from server, connection timeout.")
        })?;

        let raw = match read_timeout {
            Some(limit) => timeout(limit, stream.read_to_close()).await.map_err(|_| {
                ApiError::connection(format!("No response within {}s", limit.as_secs()))
            })?,
            None => stream.read_to_close().await,
        }
        .map_err(|e| ApiError::connection_io("Cannot read data from server", e))?;
        trace!("Read {} bytes from {}:{}", raw.len(), self.hostname, self.port);

        HttpFrame::parse(&raw).map_err(|e| ApiError::protocol(e.to_string()))
    }

    /// Release the connection handle.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            trace!("Closed connection to {}:{}", self.hostname, self.port);
        }
    }

    /// DNS resolution followed by a throwaway TCP connect.
    pub async fn check_connection(&mut self) -> bool {
        if !self.check_host().await {
            return false;
        }
        match self.tcp_connect().await {
            Ok(_probe) => true,
            Err(e) => {
                self.record_error(&e);
                false
            }
        }
    }

    /// Whether the host name resolves to at least one address.
    pub async fn check_host(&mut self) -> bool {
        let lookup = tokio::net::lookup_host((self.hostname.clone(), self.port)).await;
        match lookup {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                self.record_error(&e);
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// OS error code of the last failed connect, `-1` if none was reported.
    pub fn error_code(&self) -> i32 {
        self.error_code
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }
}

impl Drop for TransportSocket {
    fn drop(&mut self) {
        self.close();
    }
}
