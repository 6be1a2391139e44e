// ABOUTME: HTTP server assembly: shared resources, middleware stack and graceful shutdown
// ABOUTME: Used by the binary and by integration tests that drive the router in-process
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::Authenticator;
use crate::chat::ChatEngine;
use crate::middleware::{
    create_request_span, preflight_no_content, propagate_request_id_layer, set_request_id_layer,
    setup_cors,
};
use crate::routes::{ChatRoutes, HealthRoutes};

/// Shared state of every request handler
#[derive(Clone)]
pub struct ServerResources {
    /// Chat operations
    pub engine: Arc<ChatEngine>,
    /// Bearer credential resolution
    pub authenticator: Arc<Authenticator>,
}

impl ServerResources {
    /// Bundle the engine and authenticator
    #[must_use]
    pub fn new(engine: ChatEngine, authenticator: Authenticator) -> Self {
        Self {
            engine: Arc::new(engine),
            authenticator: Arc::new(authenticator),
        }
    }
}

impl std::fmt::Debug for ServerResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerResources")
            .field("engine", &self.engine)
            .field("authenticator", &self.authenticator)
            .finish()
    }
}

/// Full application router with tracing, request ids and CORS
pub fn build_router(resources: Arc<ServerResources>, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(HealthRoutes::routes())
        .merge(ChatRoutes::routes(resources))
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(TraceLayer::new_for_http().make_span_with(create_request_span))
                .layer(propagate_request_id_layer())
                .layer(axum::middleware::from_fn(preflight_no_content))
                .layer(setup_cors(cors_origins)),
        )
}

/// Bind `port` on all interfaces and serve until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails
pub async fn serve(router: Router, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}
