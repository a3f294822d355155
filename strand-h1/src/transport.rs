//! Transport layer seams.
//!
//! The server consumes these interfaces; it never implements them. An
//! embedding application wraps its actual transport (TCP listener, TLS
//! acceptor, in-memory pipe, ...) in [`ServerTransport`] and hands each
//! accepted stream to the server as a [`Connection`].

use bytes::Bytes;
use std::sync::Arc;

use crate::error::TransportError;

/// Delegate invoked with each chunk of bytes received from the peer.
pub type DataReceiver = Box<dyn FnMut(Bytes) + Send>;

/// Delegate invoked once when the connection is broken. The flag tells
/// whether the break was graceful (clean shutdown) or abrupt.
pub type BrokenHandler = Box<dyn FnMut(bool) + Send>;

/// Delegate invoked by the transport for every accepted connection.
pub type NewConnectionHandler = Box<dyn FnMut(Arc<dyn Connection>) + Send>;

/// One bidirectional byte stream to a single peer.
///
/// Delegate discipline: implementations must not invoke the receiver or
/// broken delegates re-entrantly from inside [`send`](Connection::send)
/// or [`close`](Connection::close), since the caller may hold locks the
/// delegates also take. Deliver such notifications from the transport's
/// own context instead.
pub trait Connection: Send + Sync {
    /// Identifies the peer in transport terms (for example
    /// `"10.0.0.1:51824"`). Used in diagnostics only.
    fn peer_id(&self) -> String;

    /// Installs the delegate receiving bytes from the peer, replacing
    /// any previous one. A protocol-upgrade handler calls this to take
    /// the stream over from the server core.
    fn set_data_receiver(&self, receiver: DataReceiver);

    /// Installs the delegate notified when the connection breaks,
    /// replacing any previous one.
    fn set_broken_handler(&self, handler: BrokenHandler);

    /// Queues bytes for delivery to the peer.
    fn send(&self, data: Bytes);

    /// Breaks the connection. `graceful` requests a clean shutdown
    /// (flush pending output first); `false` drops the stream
    /// immediately.
    fn close(&self, graceful: bool);
}

/// The listening side of the transport.
pub trait ServerTransport: Send + Sync {
    /// Acquires the port and begins accepting connections, announcing
    /// each one through `on_new_connection`.
    fn bind(
        &self,
        port: u16,
        on_new_connection: NewConnectionHandler,
    ) -> Result<(), TransportError>;

    /// Releases everything acquired by [`bind`](ServerTransport::bind).
    /// Must be idempotent.
    fn release(&self);
}
