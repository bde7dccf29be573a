//! # Admit Core
//!
//! Core library for an admission-control gateway that sits in front of a chat completion
//! backend and decides, per request, whether it may proceed.
//!
//! - **[`auth`]**: Session validation against stored credentials and subscription tier
//!   resolution.
//!
//! - **[`audit`]**: Banned-keyword detection over the prompt with a multi-pattern automaton.
//!
//! - **[`quota`]**: Fixed-window rate limits keyed by user, tier and model, configured by a
//!   rule document with per-tier and global fallbacks.
//!
//! - **[`entitlement`]**: Resource access rules for restricted tiers.
//!
//! - **[`pipeline`]**: Sequences the checks above and produces one terminal outcome.
//!
//! - **[`store`]**: Key-value store abstraction with Redis and in-memory backends.
//!
//! - **[`config`]**: Layered configuration (defaults, TOML, environment).
//!
//! ## Request Flow
//!
//! ```text
//! Client Request (cookies: xuserid, xtoken; header: carid; JSON body)
//!       │
//!       ▼
//! ┌──────────────────┐
//! │ SessionValidator │ ─── invalid ──► Unauthenticated
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   AuditRequest   │ ─── malformed ──► RequestInvalid
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  ContentAuditor  │ ─── keyword hit ──► ContentRejected
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   QuotaTracker   │ ─── window full / no rule ──► QuotaExceeded
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────────┐
//! │ EntitlementResolver  │ ─── label not open ──► EntitlementDenied
//! └────────┬─────────────┘
//!          ▼
//!       Allowed
//! ```
//!
//! Any store failure along the way surfaces as an [`pipeline::AdmissionError`]; it never
//! turns into an allow.

pub mod audit;
pub mod auth;
pub mod config;
pub mod entitlement;
pub mod pipeline;
pub mod quota;
pub mod store;
