//! Server configuration: a string map plus typed views of the
//! recognized keys.
//!
//! Unknown keys are stored verbatim so embedders can stash their own
//! settings. Recognized keys are re-parsed into typed fields on every
//! write; a value that fails to parse still lands in the raw map but
//! leaves the typed field at its previous value. File loading is out of
//! scope; the map is populated programmatically.

use std::collections::HashMap;

use crate::diagnostics::DiagnosticsSender;

pub(crate) const DEFAULT_PORT: u16 = 8888;
pub(crate) const DEFAULT_HEADER_LINE_LIMIT: usize = 1000;
pub(crate) const DEFAULT_INACTIVITY_TIMEOUT_SECONDS: f64 = 1.0;
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECONDS: f64 = 60.0;

/// Typed configuration state behind the string map.
pub(crate) struct Configuration {
    raw: HashMap<String, String>,
    pub port: u16,
    pub host: String,
    pub header_line_limit: usize,
    pub inactivity_timeout: f64,
    pub request_timeout: f64,
    /// Idle gap between requests before the connection is timed out;
    /// `None` disables the idle timer entirely.
    pub idle_timeout: Option<f64>,
}

impl Configuration {
    pub(crate) fn new() -> Self {
        let mut raw = HashMap::new();
        raw.insert(
            "HeaderLineLimit".to_string(),
            DEFAULT_HEADER_LINE_LIMIT.to_string(),
        );
        Self {
            raw,
            port: DEFAULT_PORT,
            host: String::new(),
            header_line_limit: DEFAULT_HEADER_LINE_LIMIT,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT_SECONDS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            idle_timeout: None,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        self.raw.get(key).cloned()
    }

    /// Stores the raw value and refreshes the matching typed field.
    /// Configuration changes are announced at diagnostic level 0.
    pub(crate) fn set(&mut self, key: &str, value: &str, diagnostics: &DiagnosticsSender) {
        self.raw.insert(key.to_string(), value.to_string());
        match key {
            "Port" => {
                if let Ok(port) = value.parse::<u16>() {
                    diagnostics.publish(
                        0,
                        format!("Port number changed from {} to {}", self.port, port),
                    );
                    self.port = port;
                }
            }
            "Host" => {
                diagnostics.publish(
                    0,
                    format!("Host changed from '{}' to '{}'", self.host, value),
                );
                self.host = value.to_string();
            }
            "HeaderLineLimit" => {
                if let Ok(limit) = value.parse::<usize>() {
                    diagnostics.publish(
                        0,
                        format!(
                            "Header line limit changed from {} to {}",
                            self.header_line_limit, limit
                        ),
                    );
                    self.header_line_limit = limit;
                }
            }
            "InactivityTimeout" => {
                if let Ok(seconds) = value.parse::<f64>() {
                    diagnostics.publish(
                        0,
                        format!(
                            "Inactivity timeout changed from {} to {}",
                            self.inactivity_timeout, seconds
                        ),
                    );
                    self.inactivity_timeout = seconds;
                }
            }
            "RequestTimeout" => {
                if let Ok(seconds) = value.parse::<f64>() {
                    diagnostics.publish(
                        0,
                        format!(
                            "Request timeout changed from {} to {}",
                            self.request_timeout, seconds
                        ),
                    );
                    self.request_timeout = seconds;
                }
            }
            "IdleTimeout" => {
                if value.is_empty() {
                    diagnostics.publish(0, "Idle timeout disabled");
                    self.idle_timeout = None;
                } else if let Ok(seconds) = value.parse::<f64>() {
                    diagnostics.publish(0, format!("Idle timeout changed to {seconds}"));
                    self.idle_timeout = Some(seconds);
                }
            }
            _ => {}
        }
    }
}
