// ABOUTME: Request tracing for correlation and structured logging
// ABOUTME: Every request gets an x-request-id and a span that later records the caller
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::extract::Request;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

/// Correlation header set on requests and echoed on responses
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Layer assigning a UUID request id when the client sent none
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying the request id onto the response
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Request id of `request`, if it carries a readable one
#[must_use]
pub fn request_id(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
}

/// Create a tracing span for an HTTP request
pub fn create_request_span(request: &Request) -> Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = request_id(request).unwrap_or_default(),
        user_id = tracing::field::Empty,
        user_role = tracing::field::Empty,
    )
}

/// Record the authenticated caller in the current request span
pub fn record_caller(user_id: &str, role: &str) {
    let span = Span::current();
    span.record("user_id", user_id);
    span.record("user_role", role);
}
