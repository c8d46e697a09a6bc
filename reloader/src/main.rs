use anyhow::{anyhow, bail, Context, Result};
use artifacts::{ArtifactSnapshot, ArtifactStore};
use clap::{Parser, Subcommand, ValueEnum};
use engine_discovery::EndpointDiscovery;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

mod config;
mod session;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

#[derive(Debug, Parser)]
#[command(name = "reloader", version, about = "Push rebuilt game resources into a running engine")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./reloader.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Find the engine endpoint in a captured engine log
    Endpoint {
        /// Log file; reads stdin if omitted
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Fingerprint every compiled file under the build directory
    Scan {
        /// Build output directory (default: from config, else ./build)
        #[arg(long, value_name = "DIR")]
        build_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file (overwrites). Stdout if omitted.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// List reloadable changes against a saved snapshot (from `scan --format json`)
    Diff {
        #[arg(long, value_name = "FILE")]
        baseline: PathBuf,
        #[arg(long, value_name = "DIR")]
        build_dir: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Encode resource paths into a reload message
    Encode {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Write raw bytes here instead of hex to stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the resource paths contained in a raw reload message
    Decode {
        file: PathBuf,
    },
    /// Build once and push changed resources to a running engine
    Reload {
        /// Engine address (with --port)
        #[arg(long, requires = "port")]
        address: Option<String>,
        /// Engine service port
        #[arg(long)]
        port: Option<u16>,
        /// Discover the endpoint from a captured engine log
        #[arg(long, value_name = "FILE", conflicts_with = "port")]
        log: Option<PathBuf>,
        /// Saved snapshot to diff against (default: empty, every supported resource is sent)
        #[arg(long, value_name = "FILE")]
        baseline: Option<PathBuf>,
    },
    /// Launch the engine and hot reload on every Enter (q to quit)
    Attach,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cfg = config::load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Version => {
            println!("reloader {} (core {})", env!("CARGO_PKG_VERSION"), reload_core::version());
        }
        Commands::Endpoint { log, format } => {
            let discovery = EndpointDiscovery::new();
            match log {
                Some(path) => feed_log(&discovery, BufReader::new(File::open(&path).with_context(|| format!("opening {}", path.display()))?))?,
                None => feed_log(&discovery, std::io::stdin().lock())?,
            }
            let ep = discovery.current_endpoint().ok_or_else(|| anyhow!("no engine service port found in log"))?;
            match format {
                OutputFormat::Text => {
                    let at = ep.last_updated.format(&Rfc3339).unwrap_or_default();
                    println!("{} (updated {})", ep, at);
                }
                OutputFormat::Json | OutputFormat::Jsonl => println!("{}", serde_json::to_string(&ep)?),
            }
        }
        Commands::Scan { build_dir, format, out } => {
            let root = build_dir.unwrap_or_else(|| cfg.build_root());
            let snap = ArtifactStore::new(cfg.fingerprint()).refresh(&root);
            match out {
                Some(path) => {
                    let mut w = BufWriter::new(File::create(&path)?);
                    write_snapshot(&mut w, &snap, format)?;
                    w.flush()?;
                }
                None => write_snapshot(&mut std::io::stdout().lock(), &snap, format)?,
            }
        }
        Commands::Diff { baseline, build_dir, format } => {
            let old = read_snapshot(&baseline)?;
            let root = build_dir.unwrap_or_else(|| cfg.build_root());
            let new = ArtifactStore::new(cfg.fingerprint()).refresh(&root);
            let changed = artifacts::diff(&old, &new);
            match format {
                OutputFormat::Text => {
                    for a in &changed { println!("{}", a.engine_resource_path); }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string(&changed)?),
                OutputFormat::Jsonl => {
                    for a in &changed { println!("{}", serde_json::to_string(a)?); }
                }
            }
        }
        Commands::Encode { paths, out } => {
            let msg = reload_protocol::encode(&paths);
            match out {
                Some(path) => std::fs::write(&path, &msg)?,
                None => println!("{}", hex::encode(&msg)),
            }
        }
        Commands::Decode { file } => {
            let bytes = std::fs::read(&file)?;
            for p in reload_protocol::decode(&bytes)? { println!("{}", p); }
        }
        Commands::Reload { address, port, log, baseline } => {
            let baseline = baseline.as_deref().map(read_snapshot).transpose()?;
            let rt = tokio::runtime::Runtime::new()?;
            let outcome = rt.block_on(session::reload_once(&cfg, address, port, log, baseline))?;
            if !matches!(outcome, hot_reload::RunOutcome::Reloaded { .. } | hot_reload::RunOutcome::NoChanges) {
                bail!("hot reload did not complete: {:?}", outcome);
            }
        }
        Commands::Attach => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(session::attach(&cfg))?;
        }
    }
    Ok(())
}

fn feed_log<R: BufRead>(discovery: &EndpointDiscovery, mut reader: R) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        discovery.record_bytes(&buf);
    }
}

fn read_snapshot(path: &Path) -> Result<ArtifactSnapshot> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing snapshot {}", path.display()))
}

fn write_snapshot<W: Write>(w: &mut W, snap: &ArtifactSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for a in snap.iter() {
                writeln!(w, "{}  {}  ({})", &a.fingerprint[..a.fingerprint.len().min(16)], a.engine_resource_path, a.compiled_file_path)?;
            }
        }
        OutputFormat::Json => writeln!(w, "{}", serde_json::to_string_pretty(snap)?)?,
        OutputFormat::Jsonl => {
            for a in snap.iter() {
                let obj = serde_json::json!({
                    "path": a.engine_resource_path,
                    "compiled": a.compiled_file_path,
                    "fingerprint": a.fingerprint,
                    "reloadable": a.kind().is_reloadable(),
                });
                writeln!(w, "{}", serde_json::to_string(&obj)?)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifacts::BuildArtifact;
    use tempfile::TempDir;

    fn snap() -> ArtifactSnapshot {
        vec![BuildArtifact {
            engine_resource_path: "/main/player.scriptc".into(),
            compiled_file_path: "default/main/player.scriptc".into(),
            fingerprint: "0123456789abcdef0123".into(),
        }]
        .into_iter()
        .collect()
    }

    #[test]
    fn cli_parses_reload_flags() {
        let cli = Cli::parse_from(["reloader", "reload", "--address", "10.0.0.2", "--port", "8001"]);
        match cli.command {
            Commands::Reload { address, port, log, baseline } => {
                assert_eq!(address.as_deref(), Some("10.0.0.2"));
                assert_eq!(port, Some(8001));
                assert!(log.is_none() && baseline.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Cli::try_parse_from(["reloader", "reload", "--port", "1", "--log", "x.log"]).is_err());
        assert!(Cli::try_parse_from(["reloader", "encode"]).is_err());
    }

    #[test]
    fn endpoint_from_log_reader() {
        let d = EndpointDiscovery::new();
        let log = "INFO:DLIB: Log server started on port 49245\nINFO:ENGINE: Engine service started on port 49246\n";
        feed_log(&d, log.as_bytes()).unwrap();
        assert_eq!(d.current_endpoint().unwrap().control_port, 49246);
    }

    #[test]
    fn endpoint_from_log_with_invalid_utf8() {
        let d = EndpointDiscovery::new();
        let log: &[u8] = b"INFO:DLIB: caf\xe9 profile\nINFO:ENGINE: Engine service started on port 8001\n";
        feed_log(&d, log).unwrap();
        assert_eq!(d.current_endpoint().unwrap().control_port, 8001);
    }

    #[test]
    fn snapshot_json_round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("snap.json");
        let mut f = File::create(&p).unwrap();
        write_snapshot(&mut f, &snap(), OutputFormat::Json).unwrap();
        drop(f);
        assert_eq!(read_snapshot(&p).unwrap(), snap());
    }

    #[test]
    fn text_and_jsonl_rendering() {
        let mut out = Vec::new();
        write_snapshot(&mut out, &snap(), OutputFormat::Text).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0123456789abcdef  /main/player.scriptc  (default/main/player.scriptc)\n");
        let mut out = Vec::new();
        write_snapshot(&mut out, &snap(), OutputFormat::Jsonl).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v["reloadable"], true);
    }
}
