//! Wiring of the reload collaborators for the `reload` and `attach` commands.

use crate::config::Config;
use anyhow::{anyhow, bail, Context, Result};
use artifacts::{ArtifactSnapshot, ArtifactStore};
use engine_discovery::EndpointDiscovery;
use engine_transport::EngineClient;
use hot_reload::{drain_lines, CommandBuilder, DiscoveryLocator, EngineLocator, HotReloader, RunOutcome, StaticLocator, TracingSink};
use reload_core::EngineEndpoint;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long the output pumps get to flush after the engine is gone.
const PUMP_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

fn build_command(cfg: &Config) -> Result<CommandBuilder> {
    let argv = cfg.build.command.clone().filter(|c| !c.is_empty()).ok_or_else(|| anyhow!("build.command is not configured"))?;
    Ok(CommandBuilder::new(argv, Some(cfg.build_cwd())))
}

fn make_reloader(cfg: &Config, locator: Arc<dyn EngineLocator>, client: EngineClient) -> Result<HotReloader> {
    Ok(HotReloader::new(
        locator,
        Arc::new(build_command(cfg)?),
        Arc::new(client),
        Arc::new(TracingSink),
        ArtifactStore::new(cfg.fingerprint()),
        cfg.build_root(),
    ))
}

/// One reload run. Endpoint precedence: flags, then a captured log, then config.
pub async fn reload_once(
    cfg: &Config,
    address: Option<String>,
    port: Option<u16>,
    log: Option<PathBuf>,
    baseline: Option<ArtifactSnapshot>,
) -> Result<RunOutcome> {
    let client = EngineClient::new(cfg.timeout())?;
    let locator: Arc<dyn EngineLocator> = match (port, log) {
        (Some(p), _) => {
            let addr = address.unwrap_or_else(|| reload_core::DEFAULT_ENGINE_ADDRESS.to_string());
            Arc::new(StaticLocator::new(EngineEndpoint::fixed(addr, p), client.clone()))
        }
        (None, Some(path)) => {
            let raw = tokio::fs::read(&path).await.with_context(|| format!("reading {}", path.display()))?;
            let discovery = Arc::new(EndpointDiscovery::new());
            for line in raw.split(|b| *b == b'\n') {
                discovery.record_bytes(line);
            }
            Arc::new(DiscoveryLocator::new(discovery, client.clone()))
        }
        (None, None) => match cfg.engine.port {
            Some(p) => {
                let addr = cfg.engine.address.clone().unwrap_or_else(|| reload_core::DEFAULT_ENGINE_ADDRESS.to_string());
                Arc::new(StaticLocator::new(EngineEndpoint::fixed(addr, p), client.clone()))
            }
            None => bail!("no engine endpoint: pass --port, --log, or set engine.port"),
        },
    };
    let mut r = make_reloader(cfg, locator, client)?;
    if let Some(snap) = baseline {
        r.set_baseline(snap);
    }
    Ok(r.run().await)
}

async fn pump_engine_output<R: AsyncRead + Unpin>(reader: R, discovery: Arc<EndpointDiscovery>) {
    let res = drain_lines(reader, |line| {
        discovery.record_bytes(line);
        println!("{}", String::from_utf8_lossy(line));
    })
    .await;
    if let Err(e) = res {
        warn!("reading engine output failed: {}", e);
    }
}

/// Waits for the pumps to reach EOF, aborting any that outlive the engine.
/// Must finish before the discovery state is reset.
async fn stop_pumps(pumps: Vec<JoinHandle<()>>) {
    for mut pump in pumps {
        if tokio::time::timeout(PUMP_DRAIN_TIMEOUT, &mut pump).await.is_err() {
            debug!("engine output still open, aborting pump");
            pump.abort();
            let _ = pump.await;
        }
    }
}

/// Launch the engine, track its endpoint, and reload on every line typed on stdin.
pub async fn attach(cfg: &Config) -> Result<()> {
    let argv = cfg.engine.command.clone().unwrap_or_default();
    let Some((program, args)) = argv.split_first() else {
        bail!("engine.command is not configured");
    };
    let client = EngineClient::new(cfg.timeout())?;
    let discovery = Arc::new(EndpointDiscovery::new());
    let locator = Arc::new(DiscoveryLocator::new(discovery.clone(), client.clone()));
    let mut reloader = make_reloader(cfg, locator, client)?;

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cfg.project_root())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {}", program))?;
    let mut pumps = Vec::new();
    if let Some(out) = child.stdout.take() {
        pumps.push(tokio::spawn(pump_engine_output(out, discovery.clone())));
    }
    if let Some(err) = child.stderr.take() {
        pumps.push(tokio::spawn(pump_engine_output(err, discovery.clone())));
    }

    let primed = reloader.prime().await?;
    info!(artifacts = primed, "engine started; press Enter to hot reload, q to quit");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        tokio::select! {
            line = input.next_line() => match line {
                Ok(Some(l)) if l.trim() == "q" => break Ok(()),
                Ok(Some(_)) => { reloader.run().await; }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.into()),
            },
            status = child.wait() => {
                break match status {
                    Ok(s) if s.success() => {
                        info!("engine exited");
                        Ok(())
                    }
                    Ok(s) => {
                        warn!("engine exited with status {}", s);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                };
            }
        }
    };
    if let Err(e) = child.kill().await {
        debug!("stopping engine: {}", e);
    }
    stop_pumps(pumps).await;
    discovery.reset();
    result
}
