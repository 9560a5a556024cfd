//! HTTP transport for the Client Sync Engine (§6 "External Interfaces").

pub mod http_error;
pub mod http_transport;

pub use http_error::{HttpTransportError, Result};
pub use http_transport::HttpSyncTransport;
