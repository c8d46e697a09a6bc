//! Hot reload orchestration: build, rescan, diff, encode, send.

mod collaborators;
mod orchestrator;

pub use collaborators::{drain_lines, CommandBuilder, DiscoveryLocator, StaticLocator, TracingSink};
pub use orchestrator::{HotReloader, RunOutcome};

use async_trait::async_trait;
use reload_core::{EngineEndpoint, ReloadError, Severity};

/// Finds an engine that is up and answering.
#[async_trait]
pub trait EngineLocator: Send + Sync {
    async fn ensure_reachable_engine(&self) -> Option<EngineEndpoint>;
}

/// Runs the project build. Returns whether it succeeded.
#[async_trait]
pub trait ProjectBuilder: Send + Sync {
    async fn build_project(&self) -> bool;
}

#[async_trait]
pub trait ResourceTransport: Send + Sync {
    async fn send_resource_reload(&self, endpoint: &EngineEndpoint, payload: Vec<u8>) -> Result<(), ReloadError>;
}

/// User facing console for run outcomes.
pub trait LogSink: Send + Sync {
    fn log(&self, text: &str, severity: Severity);
}
