//! Store failures and slow backends.
//!
//! A store error at any stage must surface as an [`AdmissionError`] naming the stage, never
//! as an allow. Two failures are absorbed: an unreadable tier marker counts as a plan
//! change, and a failure to arm the window's expiry after a successful increment is only
//! logged.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::mock_infrastructure::{
    audit_body, counter, rule_set, seed_plan, seed_resource, seed_session, FaultyStore, StoreOp,
    TOKEN, USER_ID,
};
use admit_core::{
    audit::ContentAuditor,
    pipeline::{AdmissionError, AdmissionOutcome, AdmissionPipeline, AdmissionRequest, Stage},
    quota::RateLimitRuleSet,
    store::{keys, KeyValueStore, StoreError},
};
use std::{collections::BTreeMap, sync::Arc, time::Duration};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn seeded(store: FaultyStore) -> Arc<FaultyStore> {
    seed_session(store.inner(), USER_ID, TOKEN).await.unwrap();
    seed_resource(store.inner(), "mini-car", "mini").await.unwrap();
    seed_resource(store.inner(), "plus-car", "plus").await.unwrap();
    Arc::new(store)
}

fn pipeline(store: Arc<FaultyStore>, rules: RateLimitRuleSet) -> AdmissionPipeline {
    let auditor = Arc::new(ContentAuditor::from_keywords(["forbidden"]).unwrap());
    AdmissionPipeline::new(store, auditor, Arc::new(rules))
}

async fn admit(
    pipeline: &AdmissionPipeline,
    resource_id: &str,
) -> Result<AdmissionOutcome, AdmissionError> {
    let body = audit_body("gpt-4", "hello");
    let request = AdmissionRequest { user_id: USER_ID, token: TOKEN, resource_id, body: &body };
    pipeline.admit_within(request, TIMEOUT).await
}

#[tokio::test]
async fn test_session_lookup_failure_is_error() {
    let store = seeded(FaultyStore::new().fail(StoreOp::Get, "xtoken_")).await;
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert_eq!(err.stage(), Stage::Session);
    assert!(matches!(err, AdmissionError::Store { source: StoreError::Unavailable(_), .. }));
    assert_eq!(store.calls(StoreOp::IncrBelow), 0);
}

#[tokio::test]
async fn test_counter_failure_is_error() {
    let store = seeded(FaultyStore::new().fail(StoreOp::IncrBelow, "star_rate_limit:")).await;
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert_eq!(err.stage(), Stage::Quota);
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_plan_change_reset_failure_is_error() {
    let store = seeded(FaultyStore::new().fail(StoreOp::Set, "star_rate_limit:")).await;
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert_eq!(err.stage(), Stage::Quota);
    assert_eq!(store.calls(StoreOp::IncrBelow), 0);
}

#[tokio::test]
async fn test_resource_lookup_failure_is_error_after_quota() {
    let store = seeded(FaultyStore::new().fail(StoreOp::Get, "car_status:")).await;
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert_eq!(err.stage(), Stage::Entitlement);
    assert_eq!(counter(store.inner(), USER_ID, "free", "gpt-4").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn test_malformed_counter_is_error() {
    let store = seeded(FaultyStore::new()).await;
    store.inner().set(&keys::tier_marker(USER_ID), "free", None).await.unwrap();
    store
        .inner()
        .set(&keys::quota_counter(USER_ID, "free", "gpt-4"), "many", None)
        .await
        .unwrap();
    let pipeline = pipeline(store, rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::Store { stage: Stage::Quota, source: StoreError::Malformed { .. } }
    ));
}

#[tokio::test]
async fn test_invalid_rule_is_config_error() {
    let store = seeded(FaultyStore::new()).await;
    let models: BTreeMap<String, String> = [("gpt-4".to_string(), "5/1x".to_string())].into();
    let rules = RateLimitRuleSet::new([("free".to_string(), models)].into(), None);
    let pipeline = pipeline(store, rules);

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert!(matches!(err, AdmissionError::Config { ref rule, .. } if rule == "5/1x"));
    assert_eq!(err.stage(), Stage::Quota);
}

#[tokio::test]
async fn test_tier_lookup_failure_is_error() {
    let store = seeded(FaultyStore::new().fail(StoreOp::Get, "user:")).await;
    seed_plan(store.inner(), USER_ID, "Plus").await.unwrap();
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    let err = admit(&pipeline, "plus-car").await.unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::Store { stage: Stage::Quota, source: StoreError::Unavailable(_) }
    ));
    assert_eq!(store.inner().get(&keys::tier_marker(USER_ID)).await.unwrap(), None);
    assert_eq!(store.calls(StoreOp::IncrBelow), 0);
}

#[tokio::test]
async fn test_transient_tier_failure_keeps_exhausted_window() {
    let store = seeded(FaultyStore::new()).await;
    seed_plan(store.inner(), USER_ID, "Plus").await.unwrap();
    let rules = || RateLimitRuleSet::from_json(r#"{"chatgpt":{"plus":{"gpt-4":"2/1h"}}}"#).unwrap();

    // Both pipelines share the same underlying records.
    let healthy = pipeline(store.clone(), rules());
    let flaky = pipeline(Arc::new((*store).clone().fail(StoreOp::Get, "user:")), rules());

    for _ in 0..2 {
        assert_eq!(admit(&healthy, "plus-car").await.unwrap(), AdmissionOutcome::Allowed);
    }
    let outcome = admit(&healthy, "plus-car").await.unwrap();
    assert!(matches!(outcome, AdmissionOutcome::QuotaExceeded { .. }), "{outcome:?}");

    assert!(admit(&flaky, "plus-car").await.is_err());

    for _ in 0..2 {
        let outcome = admit(&healthy, "plus-car").await.unwrap();
        assert!(matches!(outcome, AdmissionOutcome::QuotaExceeded { .. }), "{outcome:?}");
    }
    assert_eq!(counter(store.inner(), USER_ID, "plus", "gpt-4").await.unwrap().as_deref(), Some("2"));
    assert_eq!(
        store.inner().get(&keys::tier_marker(USER_ID)).await.unwrap().as_deref(),
        Some("plus")
    );
}

#[tokio::test]
async fn test_marker_read_failure_is_treated_as_plan_change() {
    let store = seeded(FaultyStore::new().fail(StoreOp::Get, "star_rate_limit_package:")).await;
    store.inner().set(&keys::tier_marker(USER_ID), "free", None).await.unwrap();
    store
        .inner()
        .set(&keys::quota_counter(USER_ID, "free", "gpt-4"), "3", None)
        .await
        .unwrap();
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    assert_eq!(admit(&pipeline, "mini-car").await.unwrap(), AdmissionOutcome::Allowed);
    assert_eq!(counter(store.inner(), USER_ID, "free", "gpt-4").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn test_expire_failure_is_swallowed() {
    let store = seeded(FaultyStore::new().fail(StoreOp::Expire, "")).await;
    store.inner().set(&keys::tier_marker(USER_ID), "free", None).await.unwrap();
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    assert_eq!(admit(&pipeline, "mini-car").await.unwrap(), AdmissionOutcome::Allowed);
    assert_eq!(store.calls(StoreOp::Expire), 1);

    let key = keys::quota_counter(USER_ID, "free", "gpt-4");
    assert_eq!(store.inner().get(&key).await.unwrap().as_deref(), Some("1"));
    assert_eq!(store.inner().ttl(&key).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_slow_session_lookup_times_out() {
    let store =
        seeded(FaultyStore::new().delay(StoreOp::Get, "xtoken_", Duration::from_secs(30))).await;
    let pipeline = pipeline(store, rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.stage(), Stage::Session);
}

#[tokio::test(start_paused = true)]
async fn test_slow_quota_store_times_out_without_consuming() {
    let store = seeded(FaultyStore::new().delay(
        StoreOp::IncrBelow,
        "star_rate_limit:",
        Duration::from_secs(30),
    ))
    .await;
    let pipeline = pipeline(store.clone(), rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.stage(), Stage::Quota);
    assert_eq!(counter(store.inner(), USER_ID, "free", "gpt-4").await.unwrap().as_deref(), Some("0"));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_spans_all_stages() {
    // Each lookup alone fits the deadline; together they do not.
    let store = seeded(
        FaultyStore::new()
            .delay(StoreOp::Get, "xtoken_", Duration::from_secs(3))
            .delay(StoreOp::IncrBelow, "star_rate_limit:", Duration::from_secs(3)),
    )
    .await;
    let pipeline = pipeline(store, rule_set().unwrap());

    let err = admit(&pipeline, "mini-car").await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.stage(), Stage::Quota);
}
