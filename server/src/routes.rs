use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use color_lock_vision::encoder::STREAM_CONTENT_TYPE;
use color_lock_vision::FrameChunks;
use futures_util::stream;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::page::INDEX_HTML;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start_camera", get(start_camera))
        .route("/stop_camera", get(stop_camera))
        .route("/video_feed", get(video_feed))
        .route("/color_data", get(color_data))
        .route("/save_color", get(save_color))
        .route("/get_history", get(get_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /start_camera — "ok", or 500 "no_camera" when no device opens
async fn start_camera(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let color_lock = Arc::clone(&state.color_lock);
    // Device probing blocks.
    let result = tokio::task::spawn_blocking(move || color_lock.start_camera()).await;

    match result {
        Ok(Ok(())) => (StatusCode::OK, "ok").into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "camera start failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "no_camera").into_response()
        }
        Err(e) => {
            error!(error = %e, "spawn_blocking failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /stop_camera — always "ok"
async fn stop_camera(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let color_lock = Arc::clone(&state.color_lock);
    // Waits for an in-flight frame read to finish.
    if let Err(e) = tokio::task::spawn_blocking(move || color_lock.stop_camera()).await {
        error!(error = %e, "spawn_blocking failed");
    }
    "ok"
}

/// GET /video_feed — multipart/x-mixed-replace stream of annotated JPEGs
async fn video_feed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let chunks = state.color_lock.frame_chunks();
    info!(generation = chunks.generation(), "video feed client attached");

    let body = stream::unfold(chunks, |chunks: FrameChunks| async move {
        // Each pull performs a blocking device read.
        let pulled = tokio::task::spawn_blocking(move || {
            let mut chunks = chunks;
            let part = chunks.next();
            (part, chunks)
        })
        .await;
        let (part, chunks) = match pulled {
            Ok(pulled) => pulled,
            Err(e) => {
                error!(error = %e, "frame pull task failed");
                return None;
            }
        };
        part.map(|bytes| (Ok::<_, Infallible>(bytes), chunks))
    });

    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
}

/// GET /color_data — {"hex": ..., "rgb": ...}
async fn color_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.color_lock.color_data())
}

/// GET /save_color — "saved"
async fn save_color(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.color_lock.save_color();
    "saved"
}

/// GET /get_history — saved colors, oldest first
async fn get_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.color_lock.history())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use color_lock_capture::backend::testing::ScriptedBackend;
    use color_lock_capture::{CaptureSession, DeviceLocator, SessionState};
    use color_lock_vision::{ColorLock, FramePipeline};
    use tower::ServiceExt;

    fn app_state(backend: ScriptedBackend) -> Arc<AppState> {
        let session = CaptureSession::new(DeviceLocator::new(Arc::new(backend), 5));
        Arc::new(AppState::new(ColorLock::new(
            session,
            FramePipeline::default(),
        )))
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = router(Arc::clone(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, body.to_vec())
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[tokio::test]
    async fn start_and_stop_acknowledge() {
        let state = app_state(ScriptedBackend::new([0]));

        let (status, _, body) = get(&state, "/start_camera").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
        assert_eq!(state.color_lock.session().state(), SessionState::Running);

        let (status, _, body) = get(&state, "/stop_camera").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
        assert_eq!(state.color_lock.session().state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn start_without_camera_is_server_error() {
        let state = app_state(ScriptedBackend::new([]));
        let (status, _, body) = get(&state, "/start_camera").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, b"no_camera");
    }

    #[tokio::test]
    async fn stop_when_idle_is_ok() {
        let state = app_state(ScriptedBackend::new([0]));
        let (status, _, body) = get(&state, "/stop_camera").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn color_data_starts_as_sentinel() {
        let state = app_state(ScriptedBackend::new([0]));
        let (status, content_type, body) = get(&state, "/color_data").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"hex": "#------", "rgb": "(---,---,---)"}));
    }

    #[tokio::test]
    async fn video_feed_streams_parts_until_read_failure() {
        let state = app_state(ScriptedBackend::new([0]).failing_on_read(5));
        get(&state, "/start_camera").await;

        let (status, content_type, body) = get(&state, "/video_feed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            content_type.as_deref(),
            Some("multipart/x-mixed-replace; boundary=frame")
        );
        assert_eq!(count(&body, b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"), 4);
        assert_eq!(state.color_lock.session().state(), SessionState::Idle);

        let (_, _, body) = get(&state, "/color_data").await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"hex": "#ff0000", "rgb": "(255,0,0)"}));
    }

    #[tokio::test]
    async fn video_feed_without_camera_is_empty() {
        let state = app_state(ScriptedBackend::new([0]));
        let (status, _, body) = get(&state, "/video_feed").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn save_then_history() {
        let state = app_state(ScriptedBackend::new([0]).with_color([0, 0, 255]).failing_on_read(2));

        let (_, _, body) = get(&state, "/save_color").await;
        assert_eq!(body, b"saved");

        get(&state, "/start_camera").await;
        get(&state, "/video_feed").await;
        get(&state, "/save_color").await;

        let (status, _, body) = get(&state, "/get_history").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"hex": "#------", "rgb": "(---,---,---)"},
                {"hex": "#0000ff", "rgb": "(0,0,255)"},
            ])
        );
    }

    #[tokio::test]
    async fn index_serves_html() {
        let state = app_state(ScriptedBackend::new([]));
        let (status, content_type, body) = get(&state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/html"));
        assert!(String::from_utf8(body).unwrap().contains("/video_feed"));
    }
}
