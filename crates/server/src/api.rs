use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use hoops_agent::AnalysisRuntime;
use hoops_core::domain::{AnalysisRequest, AnalysisVariant, CoachRequest};
use hoops_core::errors::{AnalysisError, InterfaceError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Base64 inflates by 4/3; leave room for the JSON envelope on top.
const ENVELOPE_HEADROOM_BYTES: u64 = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    runtime: Arc<AnalysisRuntime>,
    permits: Arc<Semaphore>,
    max_upload_bytes: u64,
}

impl ApiState {
    pub fn new(runtime: Arc<AnalysisRuntime>, max_concurrent: usize, max_upload_bytes: u64) -> Self {
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            max_upload_bytes,
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    pub video_data_uri: String,
    #[serde(default)]
    pub variant: Option<AnalysisVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountBody {
    pub number_of_baskets: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    correlation_id: String,
}

/// Caller-facing failure. Core errors keep their user-safe wording.
#[derive(Debug)]
pub enum ApiError {
    Interface(InterfaceError),
    UnsupportedMedia { mime_type: String, correlation_id: String },
    PayloadTooLarge { size: u64, limit: u64, correlation_id: String },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Interface(InterfaceError::BadRequest { .. }) => StatusCode::BAD_REQUEST,
            Self::Interface(InterfaceError::ServiceUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Interface(InterfaceError::BadGateway { .. }) => StatusCode::BAD_GATEWAY,
            Self::Interface(InterfaceError::Internal { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UnsupportedMedia { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Interface(error) => ErrorBody {
                error: match error {
                    InterfaceError::BadRequest { .. } => "bad_request",
                    InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
                    InterfaceError::BadGateway { .. } => "bad_gateway",
                    InterfaceError::Internal { .. } => "internal",
                },
                message: error.user_message().to_string(),
                correlation_id: error.correlation_id().to_string(),
            },
            Self::UnsupportedMedia { mime_type, correlation_id } => ErrorBody {
                error: "unsupported_media",
                message: format!("`{mime_type}` is not a video. Please upload a video file."),
                correlation_id: correlation_id.clone(),
            },
            Self::PayloadTooLarge { limit, correlation_id, .. } => ErrorBody {
                error: "payload_too_large",
                message: format!("Videos must be at most {}.", describe_limit(*limit)),
                correlation_id: correlation_id.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = self.body();
        with_correlation((self.status(), Json(body)).into_response(), &self.correlation_id())
    }
}

impl ApiError {
    fn correlation_id(&self) -> String {
        match self {
            Self::Interface(error) => error.correlation_id().to_string(),
            Self::UnsupportedMedia { correlation_id, .. }
            | Self::PayloadTooLarge { correlation_id, .. } => correlation_id.clone(),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    let body_limit = encoded_limit(state.max_upload_bytes);
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/feedback", post(feedback))
        .route("/api/coach", post(coach))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub async fn analyze(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<AnalyzeBody>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id(&headers);
    precheck_upload(&body.video_data_uri, state.max_upload_bytes, &correlation_id)?;

    let variant = body.variant.unwrap_or(state.runtime.default_variant());
    let started = Instant::now();
    let _permit = acquire(&state, &correlation_id).await?;
    let outcome = state
        .runtime
        .analyze_variant(AnalysisRequest::new(body.video_data_uri), variant, &correlation_id)
        .await;

    info!(
        event_name = "analysis.http_completed",
        correlation_id = %correlation_id,
        variant = %variant,
        ok = outcome.is_ok(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "analyze request finished"
    );
    let result = outcome.map_err(|error| interface_error(error, &correlation_id))?;
    Ok(with_correlation(Json(result).into_response(), &correlation_id))
}

pub async fn feedback(headers: HeaderMap, Json(body): Json<CountBody>) -> Response {
    let correlation_id = correlation_id(&headers);
    let feedback = hoops_core::feedback_for(body.number_of_baskets);
    with_correlation(
        Json(json!({ "numberOfBaskets": body.number_of_baskets, "feedback": feedback }))
            .into_response(),
        &correlation_id,
    )
}

pub async fn coach(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CountBody>,
) -> Result<Response, ApiError> {
    let correlation_id = correlation_id(&headers);
    let _permit = acquire(&state, &correlation_id).await?;
    let feedback = state
        .runtime
        .coach(CoachRequest { number_of_baskets: body.number_of_baskets }, &correlation_id)
        .await
        .map_err(|error| interface_error(error, &correlation_id))?;
    Ok(with_correlation(Json(feedback).into_response(), &correlation_id))
}

pub(crate) async fn acquire(
    state: &ApiState,
    correlation_id: &str,
) -> Result<tokio::sync::OwnedSemaphorePermit, ApiError> {
    state.permits.clone().acquire_owned().await.map_err(|_| {
        ApiError::Interface(InterfaceError::ServiceUnavailable {
            message: "analysis permits closed".to_string(),
            correlation_id: correlation_id.to_string(),
        })
    })
}

fn interface_error(error: AnalysisError, correlation_id: &str) -> ApiError {
    warn!(
        event_name = "analysis.http_failed",
        correlation_id = %correlation_id,
        error_kind = error.kind().code(),
        error = %error,
        "analysis request failed"
    );
    ApiError::Interface(error.into_interface(correlation_id))
}

/// Caller-side checks: declared MIME must be `video/*` and the decoded
/// payload must fit the upload limit. Malformed URIs are left to the core.
fn precheck_upload(uri: &str, max_upload_bytes: u64, correlation_id: &str) -> Result<(), ApiError> {
    if let Some(mime_type) = declared_mime(uri) {
        if !mime_type.to_ascii_lowercase().starts_with("video/") {
            return Err(ApiError::UnsupportedMedia {
                mime_type: mime_type.to_string(),
                correlation_id: correlation_id.to_string(),
            });
        }
    }

    let payload_len = uri.split_once(',').map_or(0, |(_, payload)| payload.trim().len()) as u64;
    let decoded = payload_len / 4 * 3;
    if decoded > max_upload_bytes {
        return Err(ApiError::PayloadTooLarge {
            size: decoded,
            limit: max_upload_bytes,
            correlation_id: correlation_id.to_string(),
        });
    }
    Ok(())
}

/// Whole mebibytes read as `N MB`; anything else is shown in bytes.
fn describe_limit(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}

fn declared_mime(uri: &str) -> Option<&str> {
    let header = uri.trim().strip_prefix("data:")?.split(',').next()?;
    let mime_type = header.split(';').next()?.trim();
    (!mime_type.is_empty()).then_some(mime_type)
}

fn encoded_limit(max_upload_bytes: u64) -> usize {
    let encoded = max_upload_bytes.saturating_mul(4) / 3 + ENVELOPE_HEADROOM_BYTES;
    usize::try_from(encoded).unwrap_or(usize::MAX)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn with_correlation(mut response: Response, correlation_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use hoops_agent::{AnalysisRuntime, ModelClient, ModelError, ModelRequest};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{declared_mime, describe_limit, router, ApiState, CORRELATION_HEADER};

    const CLIP: &str = "data:video/mp4;base64,AAAAIGZ0eXBpc29t";

    struct CannedModel {
        answer: Result<Value, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _request: &ModelRequest) -> Result<Option<Value>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .clone()
                .map(Some)
                .map_err(|_| ModelError::Transport("connection refused".to_string()))
        }
    }

    fn app(answer: Result<Value, ()>) -> (axum::Router, Arc<CannedModel>) {
        let model = Arc::new(CannedModel { answer, calls: AtomicUsize::new(0) });
        let runtime = AnalysisRuntime::new(model.clone()).expect("templates compile");
        (router(ApiState::new(Arc::new(runtime), 2, 1024)), model)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .header(CORRELATION_HEADER, "req-http-1")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn analyze_returns_the_model_answer() {
        let answer = json!({
            "numberOfBaskets": 2,
            "analysis": { "strengths": "Footwork.", "weaknesses": "Free throws." },
            "commentary": "Two buckets in transition."
        });
        let (app, _) = app(Ok(answer.clone()));

        let response = app
            .oneshot(post("/api/analyze", json!({ "videoDataUri": CLIP })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CORRELATION_HEADER).and_then(|v| v.to_str().ok()),
            Some("req-http-1")
        );
        assert_eq!(json_body(response).await, answer);
    }

    #[tokio::test]
    async fn non_video_uploads_never_reach_the_model() {
        let (app, model) = app(Ok(json!({})));

        let response = app
            .oneshot(post("/api/analyze", json!({ "videoDataUri": "data:image/png;base64,AAAA" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["error"], "unsupported_media");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_uploads_are_bad_requests() {
        let (app, model) = app(Ok(json!({})));

        let response = app
            .oneshot(post("/api/analyze", json!({ "videoDataUri": "data:video/mp4;base64," })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["correlationId"], "req-http-1");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected() {
        let (app, _) = app(Ok(json!({})));
        let payload = "A".repeat(2048);

        let response = app
            .oneshot(post(
                "/api/analyze",
                json!({ "videoDataUri": format!("data:video/mp4;base64,{payload}") }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["error"], "payload_too_large");
        assert_eq!(body["message"], "Videos must be at most 1024 bytes.");
    }

    #[tokio::test]
    async fn model_failures_map_to_gateway_statuses() {
        let (unavailable, _) = app(Err(()));
        let response = unavailable
            .oneshot(post("/api/analyze", json!({ "videoDataUri": CLIP, "variant": "feedback" })))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let (invalid, _) = app(Ok(json!({ "numberOfBaskets": 1 })));
        let response = invalid
            .oneshot(post("/api/analyze", json!({ "videoDataUri": CLIP, "variant": "feedback" })))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(response).await;
        assert_eq!(body["error"], "bad_gateway");
        assert!(!body["message"].as_str().unwrap_or_default().contains("numberOfBaskets"));
    }

    #[tokio::test]
    async fn feedback_endpoint_is_deterministic() {
        let (app, model) = app(Err(()));

        let response = app
            .oneshot(post("/api/feedback", json!({ "numberOfBaskets": 9 })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "numberOfBaskets": 9, "feedback": "good effort" })
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coach_endpoint_returns_feedback() {
        let (app, _) = app(Ok(json!({ "feedback": "Box out on every shot." })));

        let response = app
            .oneshot(post("/api/coach", json!({ "numberOfBaskets": 4 })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "feedback": "Box out on every shot." }));
    }

    #[test]
    fn declared_mime_reads_the_header_only() {
        assert_eq!(declared_mime("data:video/webm;codecs=vp9;base64,AAAA"), Some("video/webm"));
        assert_eq!(declared_mime("data:;base64,AAAA"), None);
        assert_eq!(declared_mime("https://example.com/clip.mp4"), None);
    }

    #[test]
    fn upload_limits_are_never_rounded_down_to_zero() {
        assert_eq!(describe_limit(1024), "1024 bytes");
        assert_eq!(describe_limit(50 * 1024 * 1024), "50 MB");
        assert_eq!(describe_limit(1024 * 1024 + 1), "1048577 bytes");
    }
}
