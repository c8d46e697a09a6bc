use crate::{EngineLocator, LogSink, ProjectBuilder, ResourceTransport};
use async_trait::async_trait;
use engine_discovery::EndpointDiscovery;
use engine_transport::EngineClient;
use reload_core::{EngineEndpoint, ReloadError, Severity};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Endpoint announced by an attached engine, confirmed with a ping.
pub struct DiscoveryLocator {
    discovery: Arc<EndpointDiscovery>,
    client: EngineClient,
}

impl DiscoveryLocator {
    pub fn new(discovery: Arc<EndpointDiscovery>, client: EngineClient) -> Self {
        DiscoveryLocator { discovery, client }
    }
}

#[async_trait]
impl EngineLocator for DiscoveryLocator {
    async fn ensure_reachable_engine(&self) -> Option<EngineEndpoint> {
        let Some(endpoint) = self.discovery.current_endpoint() else {
            debug!("engine has not announced its service port yet");
            return None;
        };
        if self.client.ping(&endpoint).await { Some(endpoint) } else { None }
    }
}

/// Endpoint given on the command line or in the config file.
pub struct StaticLocator {
    endpoint: EngineEndpoint,
    client: EngineClient,
}

impl StaticLocator {
    pub fn new(endpoint: EngineEndpoint, client: EngineClient) -> Self {
        StaticLocator { endpoint, client }
    }
}

#[async_trait]
impl EngineLocator for StaticLocator {
    async fn ensure_reachable_engine(&self) -> Option<EngineEndpoint> {
        if self.client.ping(&self.endpoint).await { Some(self.endpoint.clone()) } else { None }
    }
}

#[async_trait]
impl ResourceTransport for EngineClient {
    async fn send_resource_reload(&self, endpoint: &EngineEndpoint, payload: Vec<u8>) -> Result<(), ReloadError> {
        EngineClient::send_resource_reload(self, endpoint, payload)
            .await
            .map_err(|e| ReloadError::Transport(e.to_string()))
    }
}

/// Runs an external build command; exit status 0 means success.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
}

impl CommandBuilder {
    pub fn new(argv: Vec<String>, cwd: Option<PathBuf>) -> Self {
        CommandBuilder { argv, cwd }
    }
}

/// Feeds every line of `reader` to `f` until EOF.
///
/// Process output is not guaranteed to be UTF-8, so bad bytes are replaced
/// and reading continues; only an I/O error stops the drain early. Keeping the
/// pipe drained matters: a child writing into a closed pipe dies of SIGPIPE.
pub async fn drain_lines<R, F>(reader: R, mut f: F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&[u8]),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        f(line.strip_suffix(b"\r").unwrap_or(line));
    }
}

async fn log_lines<R: AsyncRead + Unpin>(reader: R, stream: &'static str) {
    let res = drain_lines(reader, |line| debug!(stream, "{}", String::from_utf8_lossy(line))).await;
    if let Err(e) = res {
        warn!(stream, "reading build output failed: {}", e);
    }
}

#[async_trait]
impl ProjectBuilder for CommandBuilder {
    async fn build_project(&self) -> bool {
        let Some((program, args)) = self.argv.split_first() else {
            error!("no build command configured");
            return false;
        };
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!("failed to spawn {}: {}", program, e);
                return false;
            }
        };
        let out = child.stdout.take().map(|s| tokio::spawn(log_lines(s, "stdout")));
        let err = child.stderr.take().map(|s| tokio::spawn(log_lines(s, "stderr")));
        let status = child.wait().await;
        for h in [out, err].into_iter().flatten() {
            let _ = h.await;
        }
        match status {
            Ok(s) if s.success() => true,
            Ok(s) => {
                warn!("{} exited with status {}", program, s);
                false
            }
            Err(e) => {
                error!("waiting for {} failed: {}", program, e);
                false
            }
        }
    }
}

/// Forwards sink messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, text: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("{}", text),
            Severity::Warning => warn!("{}", text),
            Severity::Error => error!("{}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> EngineClient {
        EngineClient::new(Duration::from_millis(500)).unwrap()
    }

    fn closed_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn discovery_locator_needs_control_port() {
        let discovery = Arc::new(EndpointDiscovery::new());
        let locator = DiscoveryLocator::new(discovery.clone(), client());
        assert!(locator.ensure_reachable_engine().await.is_none());
    }

    #[tokio::test]
    async fn discovered_but_dead_engine_is_unreachable() {
        let discovery = Arc::new(EndpointDiscovery::new());
        discovery.record_line(&format!("Engine service started on port {}", closed_port()));
        let locator = DiscoveryLocator::new(discovery, client());
        assert!(locator.ensure_reachable_engine().await.is_none());
    }

    #[tokio::test]
    async fn static_locator_pings_before_answering() {
        let locator = StaticLocator::new(EngineEndpoint::fixed("127.0.0.1", closed_port()), client());
        assert!(locator.ensure_reachable_engine().await.is_none());
    }

    #[tokio::test]
    async fn empty_build_command_fails() {
        assert!(!CommandBuilder::new(Vec::new(), None).build_project().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn build_success_follows_exit_status() {
        let ok = CommandBuilder::new(vec!["sh".into(), "-c".into(), "echo building; exit 0".into()], None);
        let bad = CommandBuilder::new(vec!["sh".into(), "-c".into(), "echo broken >&2; exit 3".into()], None);
        assert!(ok.build_project().await);
        assert!(!bad.build_project().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn noisy_build_with_invalid_utf8_is_fully_drained() {
        let script = "printf 'caf\\351\\n'; yes compiling | head -n 50000; exit 0";
        let b = CommandBuilder::new(vec!["sh".into(), "-c".into(), script.into()], None);
        assert!(b.build_project().await);
    }

    #[tokio::test]
    async fn drain_lines_keeps_going_past_invalid_utf8() {
        let discovery = EndpointDiscovery::new();
        let mut count = 0;
        let out: &[u8] = b"INFO:DLIB: caf\xe9 profile\r\nINFO:ENGINE: Engine service started on port 8001\nno newline";
        drain_lines(out, |line| {
            count += 1;
            discovery.record_bytes(line);
        })
        .await
        .unwrap();
        assert_eq!(count, 3);
        assert_eq!(discovery.current_endpoint().unwrap().control_port, 8001);
    }

    #[tokio::test]
    async fn missing_program_fails() {
        let b = CommandBuilder::new(vec!["definitely-not-a-build-tool-4821".into()], None);
        assert!(!b.build_project().await);
    }
}
