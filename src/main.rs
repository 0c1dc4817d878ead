mod cache;
mod config;
mod errors;
mod imaging;
mod janitor;
mod logging;
mod security;
mod server;
mod swap;

use crate::config::Config;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
                config_path = Some(PathBuf::from(&args[i]));
            }
            _ => {}
        }
        i += 1;
    }

    let mut cfg = match &config_path {
        Some(p) => Config::load(p).with_context(|| format!("loading config {}", p.display()))?,
        None => Config::default(),
    };
    cfg.apply_env().context("reading environment")?;
    cfg.validate().context("validating config")?;
    cfg.prepare_dirs()?;

    let script = cfg.tool.script_path();
    let python = cfg.tool.python_path();
    info!(
        script = %script.display(),
        script_exists = script.exists(),
        python = %python.display(),
        python_exists = python.exists(),
        assets_dir = %cfg.paths.assets_dir.display(),
        source_max_dim = cfg.resize.source_max_dim,
        target_max_dim = cfg.resize.target_max_dim,
        "swapgate ready"
    );

    let _janitor = janitor::spawn(&cfg);
    server::serve(cfg).await
}
