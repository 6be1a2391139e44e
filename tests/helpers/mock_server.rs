// ABOUTME: Local HTTP servers standing in for upstream APIs in integration tests
// ABOUTME: Binds an ephemeral port and counts the requests each server receives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

/// Shared request counter for mock handlers
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    /// Record one request and return how many came before it
    pub fn record(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// Requests received so far
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Mock server has no address");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Mock server failed");
    });
    format!("http://{addr}")
}
