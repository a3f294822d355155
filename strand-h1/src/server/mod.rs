//! Server façade and core state.
//!
//! One mutex guards everything the three thread families touch: the
//! transport's callback threads, the timer supervisor, and the reaper.
//! Connection handling, routing, and timer scans all run under it;
//! broken connection states are destroyed by the reaper thread outside
//! of it.

mod conn;
mod supervisor;

use crossbeam_channel::{bounded, unbounded, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub(crate) use conn::{ConnState, ReaperEvent};

use crate::clock::TimeKeeper;
use crate::config::Configuration;
use crate::diagnostics::{DiagnosticDelegate, DiagnosticsSender, DiagnosticsSubscription};
use crate::error::{MobilizeError, ResponseParseError};
use crate::registry::{Registration, ResourceHandler, ResourceRegistry};
use crate::request::{Request, RequestParser};
use crate::response::Response;
use crate::transport::{NewConnectionHandler, ServerTransport};

/// Everything [`Server::mobilize`] needs from the embedding
/// application.
pub struct MobilizeDependencies {
    /// Transport that will accept connections on the configured port.
    pub transport: Arc<dyn ServerTransport>,
    /// Monotonic time source driving all connection timers.
    pub time_keeper: Arc<dyn TimeKeeper>,
}

pub(crate) struct Core {
    pub(crate) config: Configuration,
    pub(crate) registry: ResourceRegistry,
    pub(crate) mobilized: bool,
    pub(crate) transport: Option<Arc<dyn ServerTransport>>,
    pub(crate) time_keeper: Option<Arc<dyn TimeKeeper>>,
    pub(crate) connections: HashMap<u64, ConnState>,
    pub(crate) next_connection_id: u64,
    pub(crate) timer_stop: Option<Sender<()>>,
    pub(crate) timer_thread: Option<JoinHandle<()>>,
}

pub(crate) struct ServerInner {
    pub(crate) core: Mutex<Core>,
    pub(crate) diagnostics: Arc<DiagnosticsSender>,
    pub(crate) reaper_tx: Sender<ReaperEvent>,
}

impl ServerInner {
    pub(crate) fn unregister_resource(&self, node_id: usize) {
        self.core.lock().unwrap().registry.unregister(node_id);
    }
}

/// The HTTP/1.1 server.
///
/// Construction starts the reaper thread; [`mobilize`](Server::mobilize)
/// binds the transport and starts the timer supervisor. Dropping the
/// server demobilizes it and joins both threads.
pub struct Server {
    inner: Arc<ServerInner>,
    reaper_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Creates an unmobilized server with default configuration.
    pub fn new() -> Self {
        let (reaper_tx, reaper_rx) = unbounded();
        let inner = Arc::new(ServerInner {
            core: Mutex::new(Core {
                config: Configuration::new(),
                registry: ResourceRegistry::new(),
                mobilized: false,
                transport: None,
                time_keeper: None,
                connections: HashMap::new(),
                next_connection_id: 0,
                timer_stop: None,
                timer_thread: None,
            }),
            diagnostics: DiagnosticsSender::new("strand-h1::Server"),
            reaper_tx,
        });
        let reaper_thread = std::thread::spawn(move || supervisor::run_reaper(reaper_rx));
        Self {
            inner,
            reaper_thread: Some(reaper_thread),
        }
    }

    /// Binds the transport on the configured `Port` and starts the
    /// timer supervisor.
    ///
    /// Fails without side effects when already mobilized or when the
    /// transport refuses the bind; after a bind failure the server may
    /// be mobilized again.
    pub fn mobilize(&self, dependencies: MobilizeDependencies) -> Result<(), MobilizeError> {
        let port = {
            let mut core = self.inner.core.lock().unwrap();
            if core.mobilized {
                return Err(MobilizeError::AlreadyMobilized);
            }
            core.mobilized = true;
            core.time_keeper = Some(dependencies.time_keeper.clone());
            core.config.port
        };

        let weak = Arc::downgrade(&self.inner);
        let on_new_connection: NewConnectionHandler = Box::new(move |connection| {
            if let Some(inner) = weak.upgrade() {
                conn::accept_connection(&inner, connection);
            }
        });
        if let Err(error) = dependencies.transport.bind(port, on_new_connection) {
            let mut core = self.inner.core.lock().unwrap();
            core.mobilized = false;
            core.time_keeper = None;
            return Err(MobilizeError::Bind(error));
        }
        self.inner
            .diagnostics
            .publish(3, format!("Now listening on port {port}"));

        let (stop_tx, stop_rx) = bounded(1);
        let weak = Arc::downgrade(&self.inner);
        let timer_thread = std::thread::spawn(move || supervisor::run_timer(weak, stop_rx));

        let mut core = self.inner.core.lock().unwrap();
        core.transport = Some(dependencies.transport);
        core.timer_stop = Some(stop_tx);
        core.timer_thread = Some(timer_thread);
        Ok(())
    }

    /// Stops the timer supervisor and releases the transport,
    /// returning the server to its pre-mobilize state. Safe to call at
    /// any time, any number of times.
    pub fn demobilize(&self) {
        let (stop, thread, transport) = {
            let mut core = self.inner.core.lock().unwrap();
            if !core.mobilized {
                return;
            }
            core.mobilized = false;
            core.time_keeper = None;
            (
                core.timer_stop.take(),
                core.timer_thread.take(),
                core.transport.take(),
            )
        };
        if let Some(stop) = stop {
            let _ = stop.send(());
        }
        if let Some(thread) = thread {
            let _ = thread.join();
        }
        if let Some(transport) = transport {
            transport.release();
        }
    }

    /// One-shot request parse using the configured header line limit
    /// and expected host. Returns the request and the offset just past
    /// it, or `None` while the input is still short of a terminal
    /// state.
    pub fn parse_request(&self, raw: &[u8]) -> Option<(Request, usize)> {
        let parser = {
            let core = self.inner.core.lock().unwrap();
            RequestParser::new(core.config.header_line_limit, core.config.host.clone())
        };
        let mut request = Request::new();
        let consumed = parser.parse(&mut request, raw);
        request.is_terminal().then_some((request, consumed))
    }

    /// Parses one complete HTTP/1.1 response (client side).
    pub fn parse_response(&self, raw: &[u8]) -> Result<(Response, usize), ResponseParseError> {
        Response::parse(raw)
    }

    /// Mounts `handler` at `path`. Returns `None` when the path would
    /// overlap an existing registration: a handler above or below it
    /// in the hierarchy.
    pub fn register_resource(
        &self,
        path: &[&str],
        handler: ResourceHandler,
    ) -> Option<Registration> {
        let segments: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        let node_id = {
            let mut core = self.inner.core.lock().unwrap();
            core.registry.register(&segments, handler)?
        };
        Some(Registration {
            server: Arc::downgrade(&self.inner),
            node_id,
        })
    }

    /// Reads a configuration item from the raw map.
    pub fn get_configuration_item(&self, key: &str) -> Option<String> {
        self.inner.core.lock().unwrap().config.get(key)
    }

    /// Writes a configuration item, refreshing the typed view of
    /// recognized keys (see the crate documentation for the key list).
    pub fn set_configuration_item(&self, key: &str, value: &str) {
        let mut core = self.inner.core.lock().unwrap();
        let diagnostics = self.inner.diagnostics.clone();
        core.config.set(key, value, &diagnostics);
    }

    /// Subscribes to diagnostic messages at `min_level` and above.
    pub fn subscribe_to_diagnostics(
        &self,
        delegate: DiagnosticDelegate,
        min_level: usize,
    ) -> DiagnosticsSubscription {
        self.inner.diagnostics.subscribe(delegate, min_level)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.demobilize();
        let _ = self.inner.reaper_tx.send(ReaperEvent::Shutdown);
        if let Some(handle) = self.reaper_thread.take() {
            let _ = handle.join();
        }
    }
}
