// ABOUTME: CORS configuration for the browser and mobile clients of the chat endpoint
// ABOUTME: Preflight requests are answered with 204 No Content
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::{header::HeaderName, HeaderValue, Method, StatusCode};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Headers the clients send
pub const ALLOWED_HEADERS: [&str; 4] = ["authorization", "x-client-info", "apikey", "content-type"];

/// Configure CORS from the configured origin list
///
/// An empty list or one containing `*` allows any origin. Unparseable entries
/// are skipped; if none remain, any origin is allowed.
#[must_use]
pub fn setup_cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
            .collect();
        if parsed.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers(ALLOWED_HEADERS.map(HeaderName::from_static))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
}

/// Rewrite successful `OPTIONS` answers to 204
///
/// Installed outside [`setup_cors`], whose preflight answer is an empty 200.
pub async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
