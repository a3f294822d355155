//! Transport-agnostic HTTP/1.1 server core.
//!
//! This crate multiplexes many client connections over an abstract
//! stream transport, parses HTTP/1.1 requests incrementally as bytes
//! arrive, routes complete requests through a hierarchical resource
//! registry, and emits standards-conformant responses. Liveness is
//! enforced by per-connection inactivity, whole-request, and optional
//! idle timers. A companion parser for complete HTTP/1.1 responses
//! serves the client side.
//!
//! The crate owns no sockets and no clock: the embedding application
//! supplies a [`ServerTransport`] that accepts connections and a
//! [`TimeKeeper`] that reports monotonic seconds. Everything else
//! (framing, connection lifecycle, routing, timeouts, and the deferred
//! destruction of broken connections) happens here.
//!
//! # Configuration keys
//!
//! | Key | Effect | Default |
//! |---|---|---|
//! | `Port` | Port bound on [`Server::mobilize`] | `8888` |
//! | `Host` | Expected `Host` header; empty accepts the request's | `""` |
//! | `HeaderLineLimit` | Max bytes for the request line and each header line | `1000` |
//! | `InactivityTimeout` | Seconds of mid-request silence before 408 | `1.0` |
//! | `RequestTimeout` | Seconds from a request's first byte to its last | `60.0` |
//! | `IdleTimeout` | Seconds of idleness between requests; empty disables | unset |
//!
//! ```no_run
//! use std::sync::Arc;
//! use strand_h1::{Connection, MobilizeDependencies, Request, Response, Server};
//!
//! # fn transport() -> Arc<dyn strand_h1::ServerTransport> { unimplemented!() }
//! # fn time_keeper() -> Arc<dyn strand_h1::TimeKeeper> { unimplemented!() }
//! let server = Server::new();
//! let registration = server
//!     .register_resource(
//!         &["echo"],
//!         Arc::new(|request: &Request, _connection: &Arc<dyn Connection>, _trailer: &[u8]| {
//!             Response::new(200, "OK").with_body(request.body.clone())
//!         }),
//!     )
//!     .expect("path is free");
//!
//! server
//!     .mobilize(MobilizeDependencies {
//!         transport: transport(),
//!         time_keeper: time_keeper(),
//!     })
//!     .expect("bind");
//! # drop(registration);
//! ```

mod clock;
mod config;
mod diagnostics;
mod error;
mod registry;
mod request;
mod response;
mod server;
mod target;
mod transport;

pub use clock::TimeKeeper;
pub use diagnostics::{DiagnosticDelegate, DiagnosticsSubscription};
pub use error::{MobilizeError, ResponseParseError, TransportError};
pub use registry::{Registration, ResourceHandler};
pub use request::{Request, RequestParser, RequestState, MAX_CONTENT_LENGTH};
pub use response::Response;
pub use server::{MobilizeDependencies, Server};
pub use target::Target;
pub use transport::{
    BrokenHandler, Connection, DataReceiver, NewConnectionHandler, ServerTransport,
};

pub use strand_headers::{HeaderField, Headers};
