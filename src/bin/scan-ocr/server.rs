//! Web form: pick an input and an output folder, run the batch, read the log.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use scan_ocr::{run_batch, PipelineConfig, RecognizerPool, RunLog};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <title>OCR App</title>
  <style>
    body { font-family: sans-serif; max-width: 40rem; margin: 3rem auto; }
    label { display: block; margin-top: 1rem; }
    input[type=text] { width: 100%; }
    button { margin-top: 1.5rem; }
  </style>
</head>
<body>
  <h1>OCR App</h1>
  <form method="post" action="/start">
    <label>Input folder <input type="text" name="input_folder"></label>
    <label>Output folder <input type="text" name="output_folder"></label>
    <button type="submit">Start</button>
  </form>
  <p><a href="/logs">View log</a></p>
</body>
</html>
"#;

/// Application state shared across handlers
struct AppState {
    config: PipelineConfig,
    pool: Arc<RecognizerPool>,
    log: RunLog,
    /// One batch at a time; the recognizers and the log are shared.
    running: Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct StartForm {
    #[serde(default)]
    input_folder: String,
    #[serde(default)]
    output_folder: String,
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
pub async fn serve(host: &str, port: u16, config: PipelineConfig, log: RunLog) -> Result<()> {
    let pool = Arc::new(RecognizerPool::from_config(&config));
    let state = Arc::new(AppState {
        config,
        pool,
        log,
        running: Mutex::new(()),
    });

    let app = router(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server listening on http://{}", addr);
    info!("  GET  /       - folder form");
    info!("  POST /start  - run a batch");
    info!("  GET  /logs   - run log");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/start", post(start_handler))
        .route("/logs", get(logs_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn logs_handler(State(state): State<Arc<AppState>>) -> String {
    state.log.content()
}

async fn start_handler(State(state): State<Arc<AppState>>, Form(form): Form<StartForm>) -> Response {
    let input = form.input_folder.trim();
    let output = form.output_folder.trim();
    if input.is_empty() || output.is_empty() {
        state.log.error("Invalid paths.");
        return (StatusCode::BAD_REQUEST, "Error: invalid paths.").into_response();
    }

    let _guard = state.running.lock().await;
    info!(input, output, "starting batch");
    match run_batch(
        Path::new(input),
        Path::new(output),
        &state.config,
        &state.pool,
        &state.log,
    )
    .await
    {
        Ok(summary) => {
            info!(
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                "batch finished"
            );
            Redirect::to("/").into_response()
        }
        Err(e) => {
            error!(error = %e, "batch failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response()
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let config = PipelineConfig::default();
        Arc::new(AppState {
            pool: Arc::new(RecognizerPool::from_config(&config)),
            config,
            log: RunLog::memory(),
            running: Mutex::new(()),
        })
    }

    fn form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/start")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_paths_are_rejected() {
        let state = test_state();
        let response = router(Arc::clone(&state))
            .oneshot(form("input_folder=&output_folder=+"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Error: invalid paths.");
        assert!(state.log.content().contains("ERROR: Invalid paths."));
    }

    #[tokio::test]
    async fn finished_batch_redirects_home() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let state = test_state();
        let body = format!(
            "input_folder={}&output_folder={}",
            input.path().display(),
            output.path().display()
        );

        let response = router(Arc::clone(&state)).oneshot(form(&body)).await.unwrap();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert!(state.log.content().contains("files processed: 0"));
    }

    #[tokio::test]
    async fn missing_input_folder_is_a_server_error() {
        let output = tempfile::tempdir().unwrap();
        let body = format!(
            "input_folder=/no/such/folder&output_folder={}",
            output.path().display()
        );
        let response = router(test_state()).oneshot(form(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn index_and_logs_are_served() {
        let state = test_state();
        state.log.info("hello");

        let index = router(Arc::clone(&state))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(index.status(), StatusCode::OK);

        let logs = router(state)
            .oneshot(Request::get("/logs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let text = to_bytes(logs.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&text).contains("INFO: hello"));
    }
}
