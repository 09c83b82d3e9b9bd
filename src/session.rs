//! JSON-RPC session over raw HTTP.
//!
//! # Flow
//!
//! ```text
//! send_request ─► RpcRequest (id, token?, method, params?)
//!              ─► HttpRequest (POST framing + common headers)
//!              ─► TransportSocket::send ─► HttpFrame
//!              ─► status check, JSON decode, token/cookie capture,
//!                 error detection ─► result
//! ```
//!
//! The first authenticated response carries a session token in
//! `result.token`; from then on it is sent in every envelope and in the
//! `X-Token` header, together with the cookies collected from `Set-Cookie`.

mod client;
mod endpoint;
mod request;

pub use client::{SessionClient, SessionState};
pub use endpoint::{Application, Endpoint, JSONRPC_VERSION};
pub use request::{random_boundary, Credentials, HttpMethod, HttpRequest, TOKEN_HEADER, USER_AGENT};
