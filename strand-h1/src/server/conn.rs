//! Per-connection state and the data-received dispatch path.

use bytes::{Bytes, BytesMut};
use std::sync::Arc;

use crate::diagnostics::DiagnosticsSender;
use crate::registry::ResourceRegistry;
use crate::request::{Request, RequestParser, RequestState};
use crate::response::Response;
use crate::server::{Core, ServerInner};
use crate::transport::Connection;

const CANNED_ERROR_BODY: &str = "BadRequest.\r\n";

/// Everything the server knows about one client connection.
pub(crate) struct ConnState {
    /// Handle to the transport. Cleared on protocol upgrade, at which
    /// point the resource handler owns the stream.
    pub(crate) transport: Option<Arc<dyn Connection>>,
    /// Received bytes not yet consumed by the request parser.
    pub(crate) buffer: BytesMut,
    /// The partial request currently being assembled.
    pub(crate) next_request: Request,
    /// When data last arrived, in time-keeper seconds.
    pub(crate) time_last_data_received: f64,
    /// When the first byte of the current request arrived.
    pub(crate) time_last_request_started: f64,
    /// When the last request finished (or the connection was accepted).
    pub(crate) time_last_request_completed: f64,
    /// Cleared once a close-triggering response has been issued.
    pub(crate) accepting_requests: bool,
    /// Whether request bytes are pending. Idle connections are exempt
    /// from the inactivity and whole-request timers.
    pub(crate) request_in_progress: bool,
}

impl ConnState {
    fn new(transport: Arc<dyn Connection>, now: f64) -> Self {
        Self {
            transport: Some(transport),
            buffer: BytesMut::new(),
            next_request: Request::new(),
            time_last_data_received: now,
            time_last_request_started: now,
            time_last_request_completed: now,
            accepting_requests: true,
            request_in_progress: false,
        }
    }
}

/// Work handed to the reaper thread.
pub(crate) enum ReaperEvent {
    /// A broken connection's state, to be dropped outside the core
    /// mutex and outside any transport delegate frame.
    Broken(ConnState),
    Shutdown,
}

enum Dispatch {
    /// Response sent; the connection accepts further requests.
    Responded,
    /// A close-triggering response was sent.
    Closed,
    /// A 101 response transferred the connection to its handler.
    Upgraded,
}

/// Wires a newly accepted connection into the core. Delegates are
/// installed after the core lock is released so a transport that
/// serializes delegate installation against delivery can never
/// deadlock against the core mutex.
pub(crate) fn accept_connection(inner: &Arc<ServerInner>, connection: Arc<dyn Connection>) {
    let id = {
        let mut core = inner.core.lock().unwrap();
        let Some(time_keeper) = core.time_keeper.clone() else {
            return;
        };
        let now = time_keeper.now();
        let id = core.next_connection_id;
        core.next_connection_id += 1;
        core.connections
            .insert(id, ConnState::new(connection.clone(), now));
        id
    };
    inner
        .diagnostics
        .publish(2, format!("New connection from {}", connection.peer_id()));

    let weak = Arc::downgrade(inner);
    connection.set_data_receiver(Box::new(move |data| {
        if let Some(inner) = weak.upgrade() {
            data_received(&inner, id, data);
        }
    }));
    let weak = Arc::downgrade(inner);
    connection.set_broken_handler(Box::new(move |_graceful| {
        if let Some(inner) = weak.upgrade() {
            connection_broken(&inner, id);
        }
    }));
}

/// The receive path: buffer the bytes, then assemble and answer as
/// many requests as the buffer now holds.
fn data_received(inner: &ServerInner, id: u64, data: Bytes) {
    let mut core = inner.core.lock().unwrap();
    let Some(time_keeper) = core.time_keeper.clone() else {
        return;
    };
    let Core {
        connections,
        config,
        registry,
        ..
    } = &mut *core;

    {
        let Some(state) = connections.get_mut(&id) else {
            return;
        };
        if !state.accepting_requests || state.transport.is_none() {
            return;
        }
        let now = time_keeper.now();
        state.time_last_data_received = now;
        if !state.request_in_progress {
            state.request_in_progress = true;
            state.time_last_request_started = now;
        }
        state.buffer.extend_from_slice(&data);
    }

    loop {
        let Some(state) = connections.get_mut(&id) else {
            return;
        };
        let Some(connection) = state.transport.clone() else {
            return;
        };
        let parser = RequestParser::new(config.header_line_limit, config.host.clone());
        let consumed = parser.parse(&mut state.next_request, &state.buffer);
        let _ = state.buffer.split_to(consumed);
        if !state.next_request.is_terminal() {
            break;
        }
        let request = std::mem::take(&mut state.next_request);
        match dispatch(state, &connection, request, registry, &inner.diagnostics) {
            Dispatch::Upgraded => {
                connections.remove(&id);
                return;
            }
            Dispatch::Closed => break,
            Dispatch::Responded => {
                let now = time_keeper.now();
                state.time_last_data_received = now;
                state.time_last_request_started = now;
                state.time_last_request_completed = now;
                state.request_in_progress = !state.buffer.is_empty();
            }
        }
    }
}

/// Routes one terminal request to a response and sends it.
fn dispatch(
    state: &mut ConnState,
    connection: &Arc<dyn Connection>,
    mut request: Request,
    registry: &ResourceRegistry,
    diagnostics: &DiagnosticsSender,
) -> Dispatch {
    let mut response = if request.state == RequestState::Complete && request.valid {
        diagnostics.publish(
            1,
            format!(
                "Received {} request for '{}' from {}",
                request.method,
                request.target,
                connection.peer_id()
            ),
        );
        match registry.lookup(request.target.segments()) {
            Some((handler, residual)) => {
                request.target.set_segments(residual);
                let trailer = state.buffer.to_vec();
                handler(&request, connection, &trailer)
            }
            None => canned_error(404, "Not Found"),
        }
    } else if request.state == RequestState::Error && request.response_status_code == 413 {
        let mut response = canned_error(
            request.response_status_code,
            &request.response_status_phrase,
        );
        response.headers.set("Connection", "close");
        response
    } else {
        let mut response = canned_error(400, "Bad Request");
        if request.state == RequestState::Error {
            response.headers.set("Connection", "close");
        }
        response
    };

    // A client that asked for close gets close echoed back, which in
    // turn makes issue_response break the connection after sending.
    if contains_close(&request.headers.multi_values("Connection")) {
        let mut tokens = response.headers.multi_values("Connection");
        if !contains_close(&tokens) {
            tokens.push("close".to_string());
            response.headers.set_multi("Connection", &tokens);
        }
    }

    issue_response(state, &response, diagnostics);

    if response.status_code == 101 {
        // The handler owns the connection now; drop our claim so no
        // further bytes are routed through the core parser.
        state.transport = None;
        return Dispatch::Upgraded;
    }
    if !state.accepting_requests {
        return Dispatch::Closed;
    }
    Dispatch::Responded
}

/// Serializes and sends a response, then applies close signalling.
pub(crate) fn issue_response(
    state: &mut ConnState,
    response: &Response,
    diagnostics: &DiagnosticsSender,
) {
    let Some(connection) = state.transport.clone() else {
        return;
    };
    connection.send(response.serialize());
    diagnostics.publish(
        1,
        format!(
            "Sent {} '{}' response back to {}",
            response.status_code,
            response.status_phrase,
            connection.peer_id()
        ),
    );
    if contains_close(&response.headers.multi_values("Connection")) {
        state.accepting_requests = false;
        connection.close(true);
    }
}

fn connection_broken(inner: &ServerInner, id: u64) {
    let mut core = inner.core.lock().unwrap();
    let Some(state) = core.connections.remove(&id) else {
        return;
    };
    if let Some(connection) = &state.transport {
        inner.diagnostics.publish(
            2,
            format!("Connection to {} is broken by peer", connection.peer_id()),
        );
    }
    // Destruction is deferred to the reaper so the state never drops
    // inside one of its own transport's delegate frames.
    let _ = inner.reaper_tx.send(ReaperEvent::Broken(state));
}

fn canned_error(status_code: u16, status_phrase: &str) -> Response {
    Response::new(status_code, status_phrase)
        .with_header("Content-Type", "text/plain")
        .with_body(CANNED_ERROR_BODY)
}

fn contains_close(tokens: &[String]) -> bool {
    tokens.iter().any(|t| t.eq_ignore_ascii_case("close"))
}
