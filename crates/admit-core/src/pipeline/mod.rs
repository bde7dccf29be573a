//! The admission pipeline.
//!
//! Stages run strictly in order and stop at the first non-allow outcome:
//!
//! ```text
//!   session ──> body ──> content audit ──> quota ──> entitlement ──> Allowed
//!      │          │            │              │            │
//!      v          v            v              v            v
//!  Unauthen-  Request-    Content-       QuotaExceeded  Entitlement-
//!  ticated    Invalid     Rejected                      Denied
//! ```
//!
//! Quota is consumed before entitlement is checked, so a request denied at the last stage
//! has already spent one unit.
//!
//! # Deadlines
//!
//! Every store-backed stage runs under the caller's deadline. When it elapses the
//! pipeline returns [`StoreError::Timeout`] for the stage in flight. A deadline that fires
//! between the quota increment and arming its expiry leaves the increment in place with
//! no expiry armed; the next plan change or operator reset clears it.

pub mod errors;
pub mod request;

pub use errors::{AdmissionError, Stage};
pub use request::{AuditRequest, RequestError};

use crate::{
    audit::{AuditVerdict, ContentAuditor},
    auth::SessionValidator,
    config::MAX_REQUEST_TIMEOUT_SECONDS,
    entitlement::EntitlementResolver,
    quota::{QuotaDecision, QuotaTracker, RateLimitRuleSet},
    store::{KeyValueStore, StoreError},
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

/// Identity and payload of one inbound request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmissionRequest<'a> {
    pub user_id: &'a str,
    pub token: &'a str,
    pub resource_id: &'a str,
    pub body: &'a [u8],
}

/// Terminal policy outcome of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Allowed,
    Unauthenticated,
    RequestInvalid(String),
    ContentRejected { keyword: String },
    QuotaExceeded { message: String },
    EntitlementDenied,
}

impl AdmissionOutcome {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Client-facing description of the outcome. Matched keywords are not disclosed.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Allowed => "ok".to_string(),
            Self::Unauthenticated => "session expired or invalid, please sign in again".to_string(),
            Self::RequestInvalid(reason) => format!("invalid request body: {reason}"),
            Self::ContentRejected { .. } => {
                "please use your account responsibly, this request contains prohibited content"
                    .to_string()
            }
            Self::QuotaExceeded { message } => message.clone(),
            Self::EntitlementDenied => {
                "this resource is not available on your plan, please switch to another one"
                    .to_string()
            }
        }
    }
}

/// Runs session, content, quota and entitlement checks for each request.
///
/// Holds only immutable state plus a store handle, so one instance serves all requests
/// concurrently.
pub struct AdmissionPipeline {
    sessions: SessionValidator,
    auditor: Arc<ContentAuditor>,
    quotas: QuotaTracker,
    entitlements: EntitlementResolver,
}

impl AdmissionPipeline {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        auditor: Arc<ContentAuditor>,
        rules: Arc<RateLimitRuleSet>,
    ) -> Self {
        Self {
            sessions: SessionValidator::new(store.clone()),
            auditor,
            quotas: QuotaTracker::new(store.clone(), rules),
            entitlements: EntitlementResolver::new(store),
        }
    }

    #[must_use]
    pub fn auditor(&self) -> &ContentAuditor {
        &self.auditor
    }

    #[must_use]
    pub fn quotas(&self) -> &QuotaTracker {
        &self.quotas
    }

    /// Runs the pipeline with a deadline `timeout` from now. Timeouts above
    /// [`MAX_REQUEST_TIMEOUT_SECONDS`] are clamped to it.
    ///
    /// # Errors
    ///
    /// See [`AdmissionPipeline::admit`].
    pub async fn admit_within(
        &self,
        request: AdmissionRequest<'_>,
        timeout: Duration,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let timeout = timeout.min(Duration::from_secs(MAX_REQUEST_TIMEOUT_SECONDS));
        self.admit(request, Instant::now() + timeout).await
    }

    /// Decides whether `request` is admitted.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] when a stage cannot reach a decision: the store failed
    /// or timed out, or the applicable rate limit rule is invalid.
    pub async fn admit(
        &self,
        request: AdmissionRequest<'_>,
        deadline: Instant,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let AdmissionRequest { user_id, token, resource_id, body } = request;

        let valid = within(deadline, self.sessions.verify(user_id, token))
            .await
            .and_then(|result| result)
            .map_err(|e| AdmissionError::store(Stage::Session, e))?;
        if !valid {
            info!(user_id, "request rejected: invalid session");
            return Ok(AdmissionOutcome::Unauthenticated);
        }

        let audit_request = match AuditRequest::from_slice(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(user_id, error = %e, "request rejected: invalid body");
                return Ok(AdmissionOutcome::RequestInvalid(e.to_string()));
            }
        };
        let model = audit_request.model.as_str();

        if let AuditVerdict::Flagged { keyword, .. } = self.auditor.check(audit_request.prompt()) {
            info!(user_id, model, keyword = %keyword, "request rejected: banned content");
            return Ok(AdmissionOutcome::ContentRejected { keyword });
        }

        let decision = within(deadline, self.quotas.check_and_consume(user_id, model))
            .await
            .map_err(|e| AdmissionError::store(Stage::Quota, e))?
            .map_err(AdmissionError::quota)?;
        if let QuotaDecision::Denied { message } = decision {
            info!(user_id, model, %message, "request rejected: quota");
            return Ok(AdmissionOutcome::QuotaExceeded { message });
        }

        let entitled = within(deadline, self.entitlements.can_use(user_id, resource_id))
            .await
            .and_then(|result| result)
            .map_err(|e| AdmissionError::store(Stage::Entitlement, e))?;
        if !entitled {
            info!(user_id, model, resource_id, "request rejected: resource not entitled");
            return Ok(AdmissionOutcome::EntitlementDenied);
        }

        debug!(user_id, model, resource_id, "request admitted");
        Ok(AdmissionOutcome::Allowed)
    }
}

async fn within<F: Future>(deadline: Instant, fut: F) -> Result<F::Output, StoreError> {
    if Instant::now() >= deadline {
        return Err(StoreError::Timeout);
    }
    timeout_at(deadline, fut).await.map_err(|_| StoreError::Timeout)
}
