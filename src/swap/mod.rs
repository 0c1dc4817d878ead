pub mod exec;

use crate::{
    cache::TargetCache,
    config::Config,
    errors::{AppError, AppResult},
    imaging, security,
};
use bytes::Bytes;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, info};

/// Fixed FaceFusion settings passed on every run.
const PROCESSORS: &str = "face_swapper";
const SWAPPER_MODEL: &str = "inswapper_128";
const PIXEL_BOOST: &str = "256x256";
const SELECTOR_MODE: &str = "one";
const SELECTOR_ORDER: &str = "large-small";
const MASK_TYPES: [&str; 2] = ["box", "occlusion"];
const MASK_BLUR: &str = "0.35";
const DETECTOR_MODEL: &str = "scrfd";
const DETECTOR_SCORE: &str = "0.5";
const EXECUTION_PROVIDER: &str = "cpu";
const OUTPUT_QUALITY: &str = "90";
const LOG_LEVEL: &str = "info";

/// Paths of the tool install, checked to exist.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub python: PathBuf,
    pub script: PathBuf,
}

/// A finished swap ready to be sent back.
#[derive(Debug)]
pub struct SwapOutput {
    pub request_id: String,
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// Orchestrates one face swap: scene lookup, resizing, tool run, result pickup.
#[derive(Clone)]
pub struct Swapper {
    cfg: Arc<Config>,
    cache: TargetCache,
    script: PathBuf,
    python: PathBuf,
}

impl Swapper {
    pub fn new(cfg: Arc<Config>) -> Self {
        let cache = TargetCache::new(cfg.paths.cache_dir.clone(), cfg.resize.target_max_dim);
        let script = cfg.tool.script_path();
        let python = cfg.tool.python_path();
        Self { cfg, cache, script, python }
    }

    /// Fail early when the tool script or its interpreter is missing.
    pub fn preflight(&self) -> AppResult<ToolPaths> {
        let script = &self.script;
        if !script.exists() {
            return Err(AppError::Misconfigured(format!("facefusion.py not found at {}", script.display())));
        }
        let python = &self.python;
        if !python.exists() {
            return Err(AppError::Misconfigured(format!("Python not found at {}", python.display())));
        }
        // the tool runs in its own working directory
        Ok(ToolPaths { python: std::path::absolute(python)?, script: std::path::absolute(script)? })
    }

    /// Run one swap with tool paths already checked by [`Swapper::preflight`].
    pub async fn swap(&self, tool: &ToolPaths, source: Bytes, scene_path: &str) -> AppResult<SwapOutput> {
        let assets = self.cfg.paths.assets_dir.clone();
        let cache = self.cache.clone();
        let scene = scene_path.to_string();
        let target = blocking(move || {
            let resolved = security::resolve_scene(&assets, &scene)?;
            Ok(std::path::absolute(cache.optimized(&resolved)?)?)
        })
        .await?;

        let request_id = new_request_id();
        let outputs = std::path::absolute(&self.cfg.paths.outputs_dir)?;
        let source_raw = outputs.join(format!("source_raw_{request_id}.jpg"));
        let source_resized = outputs.join(format!("source_{request_id}.jpg"));
        // the tool requires the output extension to match the target's
        let file_name = format!("swap_{request_id}{}", imaging::lower_ext(&target));
        let output = outputs.join(&file_name);

        if source.is_empty() {
            return Err(AppError::BadRequest("Uploaded source image is empty".into()));
        }
        tokio::fs::write(&source_raw, &source).await?;
        let max_dim = self.cfg.resize.source_max_dim;
        let source_path = blocking(move || imaging::resize_to_max_dim(&source_raw, &source_resized, max_dim)).await?;

        let args = self.build_args(&tool.script, &source_path, &target, &output);
        debug!(request_id = %request_id, python = %tool.python.display(), ?args, "running facefusion");
        let run = exec::run(&tool.python, &args, &self.cfg.tool.cwd, self.cfg.exec.timeout_s).await?;

        if !run.status.success() {
            return Err(AppError::UpstreamFailed(self.detail("FaceFusion failed.", &run)));
        }
        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(AppError::UpstreamNoOutput(
                self.detail("FaceFusion finished but no output file was found.", &run),
            ));
        }

        let body = tokio::fs::read(&output).await?;
        let elapsed_ms = run.elapsed.as_millis() as u64;
        info!(request_id = %request_id, output = %output.display(), elapsed_ms, "swap produced output");
        Ok(SwapOutput {
            request_id,
            content_type: content_type_for(&output),
            file_name,
            body,
            elapsed: run.elapsed,
        })
    }

    /// Argument list after the interpreter: script, batch subcommand, paths and fixed settings.
    pub fn build_args(&self, script: &Path, source: &Path, target: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            script.into(),
            "headless-run".into(),
            "--source-paths".into(),
            source.into(),
            "--target-path".into(),
            target.into(),
            "--output-path".into(),
            output.into(),
        ];
        let fixed: &[&str] = &[
            "--processors", PROCESSORS,
            "--face-swapper-model", SWAPPER_MODEL,
            "--face-swapper-pixel-boost", PIXEL_BOOST,
            "--face-selector-mode", SELECTOR_MODE,
            "--face-selector-order", SELECTOR_ORDER,
            "--face-mask-types", MASK_TYPES[0], MASK_TYPES[1],
            "--face-mask-blur", MASK_BLUR,
            "--face-detector-model", DETECTOR_MODEL,
            "--face-detector-score", DETECTOR_SCORE,
            "--execution-providers", EXECUTION_PROVIDER,
        ];
        args.extend(fixed.iter().map(|s| OsString::from(*s)));
        args.push("--execution-thread-count".into());
        args.push(self.cfg.exec.thread_count.to_string().into());
        for flag in ["--output-image-quality", OUTPUT_QUALITY, "--log-level", LOG_LEVEL] {
            args.push(flag.into());
        }
        args
    }

    fn detail(&self, headline: &str, run: &exec::ToolRun) -> String {
        let n = self.cfg.exec.output_tail_chars;
        format!(
            "{headline}\nstdout:\n{}\nstderr:\n{}",
            exec::tail(&run.stdout, n),
            exec::tail(&run.stderr, n)
        )
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    if imaging::lower_ext(path) == ".png" { "image/png" } else { "image/jpeg" }
}

pub fn new_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(10);
    id
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {e}")))?
}
