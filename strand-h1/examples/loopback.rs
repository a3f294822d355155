//! In-process demonstration of the server core.
//!
//! Wires the server to a loopback transport that lives entirely in
//! memory, registers a greeting resource, and pushes a request through
//! it. No sockets are involved; the same wiring works for any real
//! transport that implements the two traits.
//!
//! ```bash
//! cargo run --package strand-h1 --example loopback
//! ```

use bytes::Bytes;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use strand_h1::{
    BrokenHandler, Connection, DataReceiver, MobilizeDependencies, NewConnectionHandler, Request,
    Response, Server, ServerTransport, TimeKeeper, TransportError,
};

/// Wall clock: seconds since program start.
struct SystemTimeKeeper {
    origin: Instant,
}

impl TimeKeeper for SystemTimeKeeper {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// One end of an in-memory stream pair.
#[derive(Default)]
struct LoopbackState {
    data_receiver: Option<DataReceiver>,
    broken_handler: Option<BrokenHandler>,
    received: Vec<u8>,
    broken: bool,
}

struct LoopbackConnection {
    state: Mutex<LoopbackState>,
}

impl LoopbackConnection {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LoopbackState::default()),
        })
    }

    /// Pushes client bytes toward the server.
    fn client_send(&self, bytes: &[u8]) {
        let receiver = self.state.lock().unwrap().data_receiver.take();
        if let Some(mut receiver) = receiver {
            receiver(Bytes::copy_from_slice(bytes));
            let mut state = self.state.lock().unwrap();
            if state.data_receiver.is_none() {
                state.data_receiver = Some(receiver);
            }
        }
    }

    /// Everything the server has sent so far.
    fn client_received(&self) -> Vec<u8> {
        self.state.lock().unwrap().received.clone()
    }
}

impl Connection for LoopbackConnection {
    fn peer_id(&self) -> String {
        "loopback".to_string()
    }

    fn set_data_receiver(&self, receiver: DataReceiver) {
        self.state.lock().unwrap().data_receiver = Some(receiver);
    }

    fn set_broken_handler(&self, handler: BrokenHandler) {
        self.state.lock().unwrap().broken_handler = Some(handler);
    }

    fn send(&self, data: Bytes) {
        self.state.lock().unwrap().received.extend_from_slice(&data);
    }

    fn close(&self, _graceful: bool) {
        self.state.lock().unwrap().broken = true;
    }
}

/// A "listener" that accepts whatever connections the program hands it.
#[derive(Default)]
struct LoopbackTransport {
    acceptor: Mutex<Option<NewConnectionHandler>>,
}

impl LoopbackTransport {
    fn connect(&self, connection: Arc<dyn Connection>) {
        let handler = self.acceptor.lock().unwrap().take();
        if let Some(mut handler) = handler {
            handler(connection);
            let mut acceptor = self.acceptor.lock().unwrap();
            if acceptor.is_none() {
                *acceptor = Some(handler);
            }
        }
    }
}

impl ServerTransport for LoopbackTransport {
    fn bind(
        &self,
        _port: u16,
        on_new_connection: NewConnectionHandler,
    ) -> Result<(), TransportError> {
        *self.acceptor.lock().unwrap() = Some(on_new_connection);
        Ok(())
    }

    fn release(&self) {
        self.acceptor.lock().unwrap().take();
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let server = Server::new();
    let _subscription = server.subscribe_to_diagnostics(
        Arc::new(|sender: &str, level: usize, message: &str| {
            println!("[{sender} {level}] {message}");
        }),
        0,
    );

    let _registration = server
        .register_resource(
            &["greet"],
            Arc::new(|request: &Request, _connection: &Arc<dyn Connection>, _trailer: &[u8]| {
                let name = request
                    .target
                    .segments()
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "world".to_string());
                Response::new(200, "OK")
                    .with_header("Content-Type", "text/plain")
                    .with_body(format!("Hello, {name}!\r\n"))
            }),
        )
        .expect("path is free");

    let transport = Arc::new(LoopbackTransport::default());
    server
        .mobilize(MobilizeDependencies {
            transport: transport.clone(),
            time_keeper: Arc::new(SystemTimeKeeper {
                origin: Instant::now(),
            }),
        })
        .expect("bind");

    let connection = LoopbackConnection::new();
    transport.connect(connection.clone());
    connection.client_send(b"GET /greet/strand HTTP/1.1\r\nHost: localhost\r\n\r\n");

    let wire = connection.client_received();
    println!("--- response on the wire ---");
    print!("{}", String::from_utf8_lossy(&wire));
}
