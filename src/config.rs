use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub paths: Paths,
    pub tool: Tool,
    pub resize: Resize,
    pub exec: Exec,
    pub limits: Limits,
    pub retention: Retention,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Server {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1".to_string(), port: 8000 }
    }
}

/// Directories the service reads scenes from and writes artifacts to.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Paths {
    pub assets_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            outputs_dir: PathBuf::from("outputs"),
            cache_dir: PathBuf::from("cache_targets"),
        }
    }
}

/// Location of the external FaceFusion install.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Tool {
    pub cwd: PathBuf,
    /// Defaults to `<cwd>/facefusion.py` when unset.
    pub script: Option<PathBuf>,
    /// Interpreter; a bare name is looked up on `PATH`.
    pub python: PathBuf,
}

impl Default for Tool {
    fn default() -> Self {
        Self { cwd: PathBuf::from("facefusion"), script: None, python: PathBuf::from("python3") }
    }
}

impl Tool {
    pub fn script_path(&self) -> PathBuf {
        self.script.clone().unwrap_or_else(|| self.cwd.join("facefusion.py"))
    }

    pub fn python_path(&self) -> PathBuf {
        let bare = self.python.components().count() == 1 && !self.python.is_absolute();
        if bare {
            if let Ok(found) = which::which(&self.python) {
                return found;
            }
        }
        self.python.clone()
    }
}

/// Longest-side bounds in pixels. Zero or negative disables resizing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Resize {
    pub source_max_dim: i64,
    pub target_max_dim: i64,
}

impl Default for Resize {
    fn default() -> Self {
        Self { source_max_dim: 1024, target_max_dim: 1280 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Exec {
    pub thread_count: u32,
    pub timeout_s: u64,
    pub output_tail_chars: usize,
}

impl Default for Exec {
    fn default() -> Self {
        Self { thread_count: 4, timeout_s: 1800, output_tail_chars: 3000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Limits {
    pub max_upload_kb: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_upload_kb: 20 * 1024 }
    }
}

/// Age-based cleanup of the outputs directory.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Retention {
    pub max_age_s: u64,
    pub sweep_interval_s: u64,
}

impl Default for Retention {
    fn default() -> Self {
        Self { max_age_s: 24 * 60 * 60, sweep_interval_s: 600 }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|k| std::env::var(k).ok())
    }

    pub fn apply_vars<F>(&mut self, get: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("SWAP_BIND_ADDR") { self.server.bind_addr = v; }
        if let Some(v) = get("SWAP_PORT") { self.server.port = parse_var("SWAP_PORT", &v)?; }
        if let Some(v) = get("SWAP_ASSETS_DIR") { self.paths.assets_dir = v.into(); }
        if let Some(v) = get("SWAP_OUTPUTS_DIR") { self.paths.outputs_dir = v.into(); }
        if let Some(v) = get("SWAP_CACHE_DIR") { self.paths.cache_dir = v.into(); }
        if let Some(v) = get("FACEFUSION_CWD") { self.tool.cwd = v.into(); }
        if let Some(v) = get("FACEFUSION_SCRIPT") { self.tool.script = Some(v.into()); }
        if let Some(v) = get("FACEFUSION_PYTHON") { self.tool.python = v.into(); }
        if let Some(v) = get("SOURCE_MAX_DIM") { self.resize.source_max_dim = parse_var("SOURCE_MAX_DIM", &v)?; }
        if let Some(v) = get("TARGET_MAX_DIM") { self.resize.target_max_dim = parse_var("TARGET_MAX_DIM", &v)?; }
        if let Some(v) = get("EXECUTION_THREAD_COUNT") { self.exec.thread_count = parse_var("EXECUTION_THREAD_COUNT", &v)?; }
        if let Some(v) = get("SWAP_EXEC_TIMEOUT_S") { self.exec.timeout_s = parse_var("SWAP_EXEC_TIMEOUT_S", &v)?; }
        if let Some(v) = get("SWAP_MAX_UPLOAD_KB") { self.limits.max_upload_kb = parse_var("SWAP_MAX_UPLOAD_KB", &v)?; }
        if let Some(v) = get("SWAP_RETENTION_MAX_AGE_S") { self.retention.max_age_s = parse_var("SWAP_RETENTION_MAX_AGE_S", &v)?; }
        if let Some(v) = get("SWAP_RETENTION_SWEEP_S") { self.retention.sweep_interval_s = parse_var("SWAP_RETENTION_SWEEP_S", &v)?; }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.exec.timeout_s == 0 { anyhow::bail!("exec timeout_s must be > 0"); }
        if self.exec.thread_count == 0 { anyhow::bail!("exec thread_count must be > 0"); }
        if self.limits.max_upload_kb == 0 { anyhow::bail!("max_upload_kb must be > 0"); }
        if self.retention.max_age_s > 0 && self.retention.sweep_interval_s == 0 {
            anyhow::bail!("retention sweep_interval_s must be > 0 when max_age_s is set");
        }
        Ok(())
    }

    pub fn prepare_dirs(&self) -> anyhow::Result<()> {
        for dir in [&self.paths.outputs_dir, &self.paths.cache_dir] {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> anyhow::Result<T> {
    raw.trim().parse().map_err(|_| anyhow::anyhow!("invalid value for {key}: {raw:?}"))
}
