//! Leveled diagnostics with delegate subscriptions.
//!
//! The server publishes structured diagnostic messages at numeric
//! levels (0 configuration change, 1 per-request trace, 2 connection
//! lifecycle, 3 bind success). Embedders subscribe with a delegate and
//! a minimum level; every published message is also mirrored onto the
//! `tracing` pipeline so ordinary log collection works without a
//! subscription.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, trace};

/// Delegate receiving diagnostic messages: `(sender_name, level, text)`.
pub type DiagnosticDelegate = Arc<dyn Fn(&str, usize, &str) + Send + Sync>;

struct Subscriber {
    delegate: DiagnosticDelegate,
    min_level: usize,
}

struct SubscriberTable {
    next_id: usize,
    subscribers: HashMap<usize, Subscriber>,
}

/// Publisher side of the diagnostics channel.
pub(crate) struct DiagnosticsSender {
    name: String,
    table: Mutex<SubscriberTable>,
}

impl DiagnosticsSender {
    pub(crate) fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            table: Mutex::new(SubscriberTable {
                next_id: 0,
                subscribers: HashMap::new(),
            }),
        })
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        delegate: DiagnosticDelegate,
        min_level: usize,
    ) -> DiagnosticsSubscription {
        let mut table = self.table.lock().unwrap();
        let id = table.next_id;
        table.next_id += 1;
        table.subscribers.insert(
            id,
            Subscriber {
                delegate,
                min_level,
            },
        );
        DiagnosticsSubscription {
            sender: Arc::downgrade(self),
            id,
        }
    }

    pub(crate) fn publish(&self, level: usize, message: impl AsRef<str>) {
        let message = message.as_ref();
        match level {
            0 | 3 => info!(target: "strand_h1", sender = %self.name, diag_level = level, "{message}"),
            2 => debug!(target: "strand_h1", sender = %self.name, diag_level = level, "{message}"),
            _ => trace!(target: "strand_h1", sender = %self.name, diag_level = level, "{message}"),
        }
        let delegates: Vec<DiagnosticDelegate> = {
            let table = self.table.lock().unwrap();
            table
                .subscribers
                .values()
                .filter(|s| level >= s.min_level)
                .map(|s| s.delegate.clone())
                .collect()
        };
        for delegate in delegates {
            delegate(&self.name, level, message);
        }
    }

    fn unsubscribe(&self, id: usize) {
        self.table.lock().unwrap().subscribers.remove(&id);
    }
}

/// Handle for one diagnostics subscription.
///
/// Call [`unsubscribe`](DiagnosticsSubscription::unsubscribe) to stop
/// receiving messages; dropping the handle without doing so keeps the
/// subscription alive for the life of the server.
pub struct DiagnosticsSubscription {
    sender: Weak<DiagnosticsSender>,
    id: usize,
}

impl DiagnosticsSubscription {
    /// Ends the subscription.
    pub fn unsubscribe(self) {
        if let Some(sender) = self.sender.upgrade() {
            sender.unsubscribe(self.id);
        }
    }
}
