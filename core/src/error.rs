use std::path::PathBuf;
use thiserror::Error;

/// Failures a reload run can hit. None of them is fatal to the host process.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("engine not reachable")]
    Unreachable,
    #[error("build failed, cannot perform hot reload")]
    BuildFailed,
    #[error("failed to read {}: {source}", path.display())]
    PartialRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact scan aborted: {0}")]
    ScanAborted(String),
    #[error("transport error: {0}")]
    Transport(String),
}
