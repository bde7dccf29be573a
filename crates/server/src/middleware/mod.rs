//! HTTP middleware for the admission server.
//!
//! These adapters only deal with HTTP concerns (cookies, request ids). Admission
//! decisions are made by `admit_core::pipeline`.

pub mod cookies;
pub mod request_id;

pub use cookies::{session_cookie_middleware, SessionCookies};
pub use request_id::{create_request_id_layers, UuidRequestIdGenerator, X_REQUEST_ID};
