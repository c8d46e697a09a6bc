//! Core types shared by the hot reload modules.

mod error;

pub use error::ReloadError;

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Address used when the engine never announced one.
pub const DEFAULT_ENGINE_ADDRESS: &str = "127.0.0.1";

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Control interface of a running engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEndpoint {
    pub address: String,
    pub control_port: u16,
    pub log_port: Option<u16>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl EngineEndpoint {
    /// Endpoint that was configured by hand rather than discovered.
    pub fn fixed(address: impl Into<String>, control_port: u16) -> Self {
        EngineEndpoint {
            address: address.into(),
            control_port,
            log_port: None,
            last_updated: OffsetDateTime::now_utc(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.control_port)
    }
}

impl fmt::Display for EngineEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.control_port)?;
        if let Some(p) = self.log_port {
            write!(f, " (log port {})", p)?;
        }
        Ok(())
    }
}

/// Severity attached to messages written to a log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}
