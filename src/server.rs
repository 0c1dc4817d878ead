use crate::{
    config::Config,
    errors::{AppError, AppResult},
    swap::{SwapOutput, Swapper},
};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc, time::Instant};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub const ELAPSED_HEADER: &str = "x-swap-elapsed-sec";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub swapper: Swapper,
}

impl AppState {
    pub fn new(cfg: Arc<Config>) -> Self {
        let swapper = Swapper::new(cfg.clone());
        Self { cfg, swapper }
    }
}

pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", cfg.server.bind_addr, cfg.server.port);
    let app = build_router(AppState::new(Arc::new(cfg)));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;
    Ok(())
}

pub fn build_router(shared: AppState) -> Router {
    let limit_bytes = shared.cfg.limits.max_upload_kb * 1024;
    Router::new()
        .route("/health", get(health))
        .route(
            "/swap",
            post(swap).layer::<_, Infallible>(DefaultBodyLimit::max(limit_bytes)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    facefusion_cwd: String,
    facefusion_script: String,
    facefusion_script_exists: bool,
    facefusion_python: String,
    facefusion_python_exists: bool,
    assets_dir: String,
    outputs_dir: String,
    cache_dir: String,
    source_max_dim: i64,
    target_max_dim: i64,
    execution_thread_count: u32,
    exec_timeout_s: u64,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let cfg = &state.cfg;
    let script = cfg.tool.script_path();
    let python = cfg.tool.python_path();
    Json(Health {
        status: "ok",
        facefusion_cwd: cfg.tool.cwd.display().to_string(),
        facefusion_script_exists: script.exists(),
        facefusion_script: script.display().to_string(),
        facefusion_python_exists: python.exists(),
        facefusion_python: python.display().to_string(),
        assets_dir: cfg.paths.assets_dir.display().to_string(),
        outputs_dir: cfg.paths.outputs_dir.display().to_string(),
        cache_dir: cfg.paths.cache_dir.display().to_string(),
        source_max_dim: cfg.resize.source_max_dim,
        target_max_dim: cfg.resize.target_max_dim,
        execution_thread_count: cfg.exec.thread_count,
        exec_timeout_s: cfg.exec.timeout_s,
    })
}

async fn swap(State(state): State<AppState>, multipart: Multipart) -> Response {
    let started = Instant::now();
    let mut scene = String::new();
    let result = async {
        // checked before the upload is read
        let tool = state.swapper.preflight()?;
        let (source, scene_path) = read_form(multipart).await?;
        scene = scene_path;
        state.swapper.swap(&tool, source, &scene).await
    }
    .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(out) => {
            audit(Some(&out.request_id), &scene, "allow", "OK", duration_ms, out.body.len() as u64);
            swap_response(out)
        }
        Err(e) => {
            audit(None, &scene, "error", e.code(), duration_ms, 0);
            e.into_response()
        }
    }
}

fn swap_response(out: SwapOutput) -> Response {
    let headers = [
        (header::CONTENT_TYPE, out.content_type.to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", out.file_name)),
        (HeaderName::from_static(ELAPSED_HEADER), format!("{:.2}", out.elapsed.as_secs_f64())),
        (HeaderName::from_static(REQUEST_ID_HEADER), out.request_id),
    ];
    (StatusCode::OK, headers, out.body).into_response()
}

async fn read_form(mut multipart: Multipart) -> AppResult<(Bytes, String)> {
    let mut source = None;
    let mut scene_path = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "source" => source = Some(field.bytes().await.map_err(multipart_error)?),
            "scene_path" => scene_path = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }
    let source = source.ok_or_else(|| AppError::BadRequest("missing multipart field 'source'".into()))?;
    let scene_path = scene_path.ok_or_else(|| AppError::BadRequest("missing multipart field 'scene_path'".into()))?;
    Ok((source, scene_path))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::RequestTooLarge
    } else {
        AppError::BadRequest(e.body_text())
    }
}

fn audit(request_id: Option<&str>, scene: &str, decision: &str, code: &str, duration_ms: u64, bytes_out: u64) {
    tracing::info!(
        request_id = request_id,
        scene = scene,
        decision = decision,
        code = code,
        duration_ms = duration_ms,
        bytes_out = bytes_out,
        "audit"
    );
}
