use crate::{EngineLocator, LogSink, ProjectBuilder, ResourceTransport};
use artifacts::{diff, ArtifactSnapshot, ArtifactStore};
use reload_core::{ReloadError, Severity};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// How a single reload run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Unreachable,
    BuildFailed,
    RescanFailed(String),
    NoChanges,
    Reloaded { count: usize },
    TransportFailed { count: usize, message: String },
}

/// Drives one project's reload runs and owns its baseline snapshot.
///
/// `run` takes `&mut self`, so runs on one reloader never overlap. Dropping a
/// run future between steps sends nothing and leaves the previous baseline in
/// place; the baseline is swapped in one assignment after a complete rescan.
pub struct HotReloader {
    locator: Arc<dyn EngineLocator>,
    builder: Arc<dyn ProjectBuilder>,
    transport: Arc<dyn ResourceTransport>,
    sink: Arc<dyn LogSink>,
    store: ArtifactStore,
    build_root: PathBuf,
    snapshot: ArtifactSnapshot,
}

impl HotReloader {
    pub fn new(
        locator: Arc<dyn EngineLocator>,
        builder: Arc<dyn ProjectBuilder>,
        transport: Arc<dyn ResourceTransport>,
        sink: Arc<dyn LogSink>,
        store: ArtifactStore,
        build_root: impl Into<PathBuf>,
    ) -> Self {
        HotReloader {
            locator,
            builder,
            transport,
            sink,
            store,
            build_root: build_root.into(),
            snapshot: ArtifactSnapshot::new(),
        }
    }

    /// Start from a known baseline instead of an empty one.
    pub fn set_baseline(&mut self, snapshot: ArtifactSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn snapshot(&self) -> &ArtifactSnapshot {
        &self.snapshot
    }

    /// Record the current build output as baseline without building or sending.
    pub async fn prime(&mut self) -> Result<usize, ReloadError> {
        let snap = self.rescan().await?;
        let n = snap.len();
        self.snapshot = snap;
        debug!(artifacts = n, "baseline snapshot primed");
        Ok(n)
    }

    pub async fn run(&mut self) -> RunOutcome {
        let Some(endpoint) = self.locator.ensure_reachable_engine().await else {
            self.report(&ReloadError::Unreachable.to_string(), Severity::Warning);
            return RunOutcome::Unreachable;
        };
        debug!(%endpoint, "engine reachable");

        if !self.builder.build_project().await {
            self.report(&ReloadError::BuildFailed.to_string(), Severity::Error);
            return RunOutcome::BuildFailed;
        }

        let current = match self.rescan().await {
            Ok(s) => s,
            Err(e) => {
                let message = e.to_string();
                self.report(&format!("rescan failed: {}", message), Severity::Error);
                return RunOutcome::RescanFailed(message);
            }
        };
        let changed = diff(&self.snapshot, &current);
        self.snapshot = current;

        if changed.is_empty() {
            self.report("build completed", Severity::Info);
            return RunOutcome::NoChanges;
        }

        let count = changed.len();
        let payload = reload_protocol::encode(changed.iter().map(|a| a.engine_resource_path.as_str()));
        debug!(resources = count, bytes = payload.len(), "sending reload message");
        match self.transport.send_resource_reload(&endpoint, payload).await {
            Ok(()) => {
                self.report(&format!("reloaded {} resources", count), Severity::Info);
                RunOutcome::Reloaded { count }
            }
            Err(e) => {
                let message = e.to_string();
                self.report(&format!("hot reload failed: {}", message), Severity::Error);
                RunOutcome::TransportFailed { count, message }
            }
        }
    }

    async fn rescan(&self) -> Result<ArtifactSnapshot, ReloadError> {
        let store = self.store;
        let root = self.build_root.clone();
        tokio::task::spawn_blocking(move || store.refresh(&root))
            .await
            .map_err(|e| ReloadError::ScanAborted(e.to_string()))
    }

    fn report(&self, text: &str, severity: Severity) {
        self.sink.log(text, severity);
    }
}
