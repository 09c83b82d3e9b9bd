//! Mail-server administration client library.
//!
//! Speaks JSON-RPC over hand-framed HTTP/1.1 to the administration (or
//! webmail) endpoint of a Kerio Connect style mail server:
//!
//! - `transport` - one-shot TCP/TLS socket, response splitting, chunked decoding
//! - `session` - session state, request framing, response interpretation
//! - `admin` - typed RPC catalog (domains, users, groups, aliases, ...)
//! - `models` - serde models for catalog results
//! - `config` - configuration for the `mailbox-usage` tool
//!
//! ```ignore
//! use mailadmin_rpc::{Application, Endpoint, SessionClient};
//! use mailadmin_rpc::admin::AdminApi;
//!
//! let application = Application::new("Usage monitor", "Example Ltd.", "1.0")?;
//! let mut session = SessionClient::new(application, Endpoint::admin())?;
//! session.login("mail.example.com", "admin", "secret").await?;
//! let domains = AdminApi::new(&mut session).domains(&["id", "name"]).await?;
//! session.logout().await?;
//! ```

pub mod admin;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod models;
pub mod session;
pub mod transport;

pub use error::{ApiError, ErrorCode, ErrorKind};
pub use session::{Application, Endpoint, SessionClient};
