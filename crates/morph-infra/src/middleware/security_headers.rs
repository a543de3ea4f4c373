use axum::extract::State;
use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};

/// Header policy, fixed at startup
#[derive(Clone, Copy, Debug, Default)]
pub struct SecurityHeaders {
    /// Adds HSTS; only meaningful behind HTTPS
    pub hsts: bool,
}

/// The API docs page loads its UI bundle from a CDN and would break under the strict CSP
const DOCS_PATH_PREFIX: &str = "/docs";

/// Security headers middleware
///
/// Use with `axum::middleware::from_fn_with_state(SecurityHeaders { .. }, ..)`.
pub async fn security_headers_middleware(
    State(policy): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let is_docs = request.uri().path().starts_with(DOCS_PATH_PREFIX);
    let mut response = next.run(request).await;

    let headers = response.headers_mut();

    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if policy.hsts {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    if !is_docs {
        headers.insert(
            "Content-Security-Policy",
            HeaderValue::from_static("default-src 'none'; img-src 'self'; frame-ancestors 'none'"),
        );
    }

    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    response
}
