//! Raw HTTP transport for the JSON-RPC session.
//!
//! Each request gets its own connection:
//!
//! ```text
//! open ─► probe (DNS + throwaway connect) ─► write ─► read to EOF ─► drop
//! ```
//!
//! The response is split at the first blank line and, when the headers
//! announce `Transfer-Encoding: chunked`, the body is reassembled before it
//! is handed back to the session layer.

mod chunked;
mod response;
mod socket;
mod tls;

pub use chunked::{decode_chunked, ChunkError};
pub use response::{HttpFrame, StatusLine};
pub use socket::{TransportOptions, TransportSocket, DEFAULT_CONNECT_TIMEOUT_SECS};
pub use tls::build_connector;
