//! Engine endpoint discovery from the engine's own log output.
//!
//! The engine picks its service ports at startup and only announces them on
//! stdout, so the control address has to be scraped from the live log stream.

use parking_lot::Mutex;
use regex::Regex;
use reload_core::{EngineEndpoint, DEFAULT_ENGINE_ADDRESS};
use std::sync::OnceLock;
use time::OffsetDateTime;
use tracing::debug;

/// One fact announced by a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    LogPort(u16),
    ControlPort(u16),
    Address(String),
}

struct LinePatterns {
    log_port: Regex,
    control_port: Regex,
    target: Regex,
}

fn patterns() -> &'static LinePatterns {
    static PATTERNS: OnceLock<LinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| LinePatterns {
        log_port: Regex::new(r"Log server started on port (\d+)").expect("log port pattern"),
        control_port: Regex::new(r"Engine service started on port (\d+)").expect("control port pattern"),
        target: Regex::new(r"Target listening with name: (.+?) - (.+?) - (.+)").expect("target pattern"),
    })
}

/// Parse a single log line. Blank lines and lines matching nothing yield no events.
/// Ports that do not fit a `u16` are ignored.
pub fn parse_line(text: &str) -> Vec<LogEvent> {
    let line = text.trim();
    let mut events = Vec::new();
    if line.is_empty() {
        return events;
    }
    let p = patterns();
    if let Some(port) = p.log_port.captures(line).and_then(|c| c[1].parse().ok()) {
        events.push(LogEvent::LogPort(port));
    }
    if let Some(port) = p.control_port.captures(line).and_then(|c| c[1].parse().ok()) {
        events.push(LogEvent::ControlPort(port));
    }
    if let Some(c) = p.target.captures(line) {
        events.push(LogEvent::Address(c[2].trim().to_string()));
    }
    events
}

/// Latest facts known about one attached engine process.
#[derive(Debug, Clone)]
pub struct EngineTargetInfo {
    pub address: Option<String>,
    pub control_port: Option<u16>,
    pub log_port: Option<u16>,
    pub last_updated: OffsetDateTime,
}

impl EngineTargetInfo {
    fn empty() -> Self {
        EngineTargetInfo { address: None, control_port: None, log_port: None, last_updated: OffsetDateTime::now_utc() }
    }

    fn apply(&mut self, event: LogEvent) {
        match event {
            LogEvent::LogPort(p) => self.log_port = Some(p),
            LogEvent::ControlPort(p) => self.control_port = Some(p),
            LogEvent::Address(a) => self.address = Some(a),
        }
        self.last_updated = OffsetDateTime::now_utc();
    }

    fn endpoint(&self) -> Option<EngineEndpoint> {
        let control_port = self.control_port?;
        Some(EngineEndpoint {
            address: self.address.clone().unwrap_or_else(|| DEFAULT_ENGINE_ADDRESS.to_string()),
            control_port,
            log_port: self.log_port,
            last_updated: self.last_updated,
        })
    }
}

/// Tracks the endpoint of a single engine process.
///
/// Lines usually arrive from the process reader thread while readers call
/// [`EndpointDiscovery::current_endpoint`] from elsewhere; every access goes
/// through the same lock so a reader never sees a half-applied line.
pub struct EndpointDiscovery {
    info: Mutex<EngineTargetInfo>,
}

impl Default for EndpointDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointDiscovery {
    pub fn new() -> Self {
        EndpointDiscovery { info: Mutex::new(EngineTargetInfo::empty()) }
    }

    pub fn record_line(&self, text: &str) {
        let events = parse_line(text);
        if events.is_empty() {
            return;
        }
        let mut info = self.info.lock();
        for ev in events {
            debug!(?ev, "engine log event");
            info.apply(ev);
        }
    }

    /// Raw process output; bytes that are not UTF-8 are replaced, not rejected.
    pub fn record_bytes(&self, raw: &[u8]) {
        self.record_line(&String::from_utf8_lossy(raw));
    }

    pub fn current_endpoint(&self) -> Option<EngineEndpoint> {
        self.info.lock().endpoint()
    }

    /// Copy of the raw tracked state.
    pub fn target_info(&self) -> EngineTargetInfo {
        self.info.lock().clone()
    }

    /// Forget everything; called when the process exits or another one is attached.
    pub fn reset(&self) {
        *self.info.lock() = EngineTargetInfo::empty();
    }
}
