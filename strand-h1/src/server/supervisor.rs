//! Timer supervisor and reaper threads.
//!
//! The supervisor wakes every 50 ms (or immediately on shutdown) and
//! scans established connections for timer breaches, answering each
//! with `408 Request Timeout` through the normal response path. The
//! reaper drains broken connection states off a channel and drops them
//! with no lock held, so a connection is never destroyed from inside
//! one of its own delegate callbacks.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Weak;
use std::time::Duration;

use crate::response::Response;
use crate::server::conn::{issue_response, ReaperEvent};
use crate::server::{Core, ServerInner};

pub(crate) const TIMER_POLLING_PERIOD: Duration = Duration::from_millis(50);

pub(crate) fn run_timer(inner: Weak<ServerInner>, stop: Receiver<()>) {
    loop {
        match stop.recv_timeout(TIMER_POLLING_PERIOD) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        let Some(inner) = inner.upgrade() else { break };
        scan_for_timeouts(&inner);
    }
}

/// One pass over the established connections.
///
/// A connection with a request in flight breaches when data stops
/// flowing for longer than the inactivity timeout, or when the whole
/// request has taken longer than the request timeout. A connection
/// sitting between requests breaches only the optional idle timeout.
fn scan_for_timeouts(inner: &ServerInner) {
    let mut core = inner.core.lock().unwrap();
    let Some(time_keeper) = core.time_keeper.clone() else {
        return;
    };
    let now = time_keeper.now();
    let Core {
        connections,
        config,
        ..
    } = &mut *core;
    for state in connections.values_mut() {
        if !state.accepting_requests || state.transport.is_none() {
            continue;
        }
        let breached = if state.request_in_progress {
            now - state.time_last_data_received > config.inactivity_timeout
                || now - state.time_last_request_started > config.request_timeout
        } else {
            config
                .idle_timeout
                .is_some_and(|limit| now - state.time_last_request_completed > limit)
        };
        if breached {
            let response =
                Response::new(408, "Request Timeout").with_header("Connection", "close");
            issue_response(state, &response, &inner.diagnostics);
        }
    }
}

pub(crate) fn run_reaper(events: Receiver<ReaperEvent>) {
    while let Ok(event) = events.recv() {
        match event {
            // Dropping here, outside the core mutex and outside any
            // delegate frame, is the whole point.
            ReaperEvent::Broken(state) => drop(state),
            ReaperEvent::Shutdown => break,
        }
    }
}
