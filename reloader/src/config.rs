use anyhow::{Context, Result};
use artifacts::FingerprintAlgorithm;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "reloader.yaml";
const DEFAULT_BUILD_DIR: &str = "build";
const DEFAULT_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub root: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    pub command: Option<Vec<String>>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub command: Option<Vec<String>>,
    pub address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    pub fingerprint: Option<FingerprintAlgorithm>,
}

impl Config {
    pub fn project_root(&self) -> PathBuf {
        self.project.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build output directory; relative paths hang off the project root.
    pub fn build_root(&self) -> PathBuf {
        let dir = self.project.build_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR));
        if dir.is_absolute() { dir } else { self.project_root().join(dir) }
    }

    /// Working directory for the build command, the project root unless set.
    pub fn build_cwd(&self) -> PathBuf {
        self.build.cwd.clone().unwrap_or_else(|| self.project_root())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.transport.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn fingerprint(&self) -> FingerprintAlgorithm {
        self.fingerprint.unwrap_or_default()
    }
}

/// Load the config file. An explicit path must exist and parse; without one,
/// `./reloader.yaml` is used when present and defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}
