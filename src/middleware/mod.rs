// ABOUTME: HTTP middleware for request tracing and cross-origin access
// ABOUTME: Provides request ID generation, request spans and the CORS layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// CORS layer and preflight status
pub mod cors;
/// Request ids and spans
pub mod tracing;

pub use cors::{preflight_no_content, setup_cors};
pub use tracing::{
    create_request_span, propagate_request_id_layer, record_caller, set_request_id_layer,
    REQUEST_ID_HEADER,
};
