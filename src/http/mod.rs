//! # HTTP Module
//!
//! JSON-over-HTTP facade for the reminder engine.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Status and health endpoints, graceful shutdown
//! - 1.0.0: Initial HTTP/1.1 facade

pub mod protocol;
pub mod routes;
pub mod server;

pub use protocol::{HttpRequest, HttpResponse, ProtocolError};
pub use routes::route;
pub use server::{HttpServer, ServerHandle};
