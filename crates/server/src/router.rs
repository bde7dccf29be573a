use crate::{middleware::request_id::request_id, middleware::SessionCookies, AppState};
use admit_core::{
    config::PolicyConfig,
    pipeline::{AdmissionOutcome, AdmissionRequest},
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::json;
use tower_http::request_id::RequestId;
use tracing::{error, warn};

pub const RESOURCE_ID_HEADER: &str = "carid";

const READY_MESSAGE: &str = "admission gateway is ready";

/// Status codes for outcomes whose mapping is deployment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    pub invalid_session: StatusCode,
    pub entitlement_denied: StatusCode,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            invalid_session: StatusCode::UNAUTHORIZED,
            entitlement_denied: StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl TryFrom<&PolicyConfig> for StatusPolicy {
    type Error = String;

    fn try_from(config: &PolicyConfig) -> Result<Self, Self::Error> {
        let invalid_session = match config.invalid_session_status {
            401 => StatusCode::UNAUTHORIZED,
            429 => StatusCode::TOO_MANY_REQUESTS,
            other => return Err(format!("unsupported invalid session status {other}")),
        };
        let entitlement_denied = match config.entitlement_denied_status {
            429 => StatusCode::TOO_MANY_REQUESTS,
            403 => StatusCode::FORBIDDEN,
            other => return Err(format!("unsupported entitlement denied status {other}")),
        };
        Ok(Self { invalid_session, entitlement_denied })
    }
}

impl StatusPolicy {
    #[must_use]
    pub fn status_for(&self, outcome: &AdmissionOutcome) -> StatusCode {
        match outcome {
            AdmissionOutcome::Allowed => StatusCode::OK,
            AdmissionOutcome::Unauthenticated => self.invalid_session,
            AdmissionOutcome::RequestInvalid(_) | AdmissionOutcome::ContentRejected { .. } => {
                StatusCode::BAD_REQUEST
            }
            AdmissionOutcome::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AdmissionOutcome::EntitlementDenied => self.entitlement_denied,
        }
    }
}

/// Resource id from the `carid` header with all spaces removed.
#[must_use]
pub fn resource_id(headers: &HeaderMap) -> String {
    headers
        .get(RESOURCE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.replace(' ', ""))
        .unwrap_or_default()
}

/// `POST /audit`: runs the admission pipeline for one request.
pub async fn handle_audit(
    State(state): State<AppState>,
    Extension(session): Extension<SessionCookies>,
    id: Option<Extension<RequestId>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let resource_id = resource_id(&headers);
    let request = AdmissionRequest {
        user_id: &session.user_id,
        token: &session.token,
        resource_id: &resource_id,
        body: &body,
    };

    match state.pipeline.admit_within(request, state.request_timeout).await {
        Ok(AdmissionOutcome::Allowed) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Ok(outcome) => {
            let status = state.policy.status_for(&outcome);
            (status, Json(json!({ "error": outcome.message() }))).into_response()
        }
        Err(e) => {
            error!(
                request_id = request_id(id.as_ref().map(|Extension(id)| id)),
                user_id = %session.user_id,
                stage = %e.stage(),
                error = %e,
                "admission failed"
            );
            let message = format!("internal error during {}", e.stage());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
        }
    }
}

/// `GET /` and `GET /audit`.
pub async fn handle_root() -> impl IntoResponse {
    Json(json!({ "message": READY_MESSAGE }))
}

/// `GET /health`: healthy when the store answers a ping within the request deadline.
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let ping = tokio::time::timeout(state.request_timeout, state.store.ping()).await;

    match ping {
        Ok(Ok(())) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Ok(Err(e)) => {
            warn!(error = %e, "health check: store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
        }
        Err(_) => {
            warn!("health check: store ping timed out");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": "store ping timed out" })),
            )
        }
    }
}
