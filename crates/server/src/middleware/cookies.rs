use axum::{
    extract::Request,
    http::{header::COOKIE, HeaderMap},
    middleware::Next,
    response::Response,
};
use cookie::Cookie;

pub const USER_ID_COOKIE: &str = "xuserid";
pub const TOKEN_COOKIE: &str = "xtoken";

/// Session identity carried in the `xuserid` and `xtoken` cookies.
///
/// Missing cookies are left empty; the session check downstream rejects them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub user_id: String,
    pub token: String,
}

impl SessionCookies {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut session = Self::default();

        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };

            for cookie in Cookie::split_parse(header).filter_map(Result::ok) {
                let value = unquote(cookie.value().trim());
                match cookie.name().trim() {
                    USER_ID_COOKIE => session.user_id = value.to_string(),
                    TOKEN_COOKIE => session.token = value.to_string(),
                    _ => {}
                }
            }
        }

        session
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Parses the session cookies and stores them in request extensions.
pub async fn session_cookie_middleware(mut request: Request, next: Next) -> Response {
    let session = SessionCookies::from_headers(request.headers());
    request.extensions_mut().insert(session);
    next.run(request).await
}
