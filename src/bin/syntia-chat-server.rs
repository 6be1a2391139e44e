// ABOUTME: Server binary for the syntia-chat conversational agent
// ABOUTME: Loads configuration, wires datastore, Vertex AI and identity provider, then serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Syntia Chat Server Binary
//!
//! Starts the chat API: one endpoint for send, rate, history and usage, plus
//! a health check.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use syntia_chat::{
    auth::{Authenticator, SupabaseIdentityProvider},
    cache::ExpiringCache,
    chat::{ChatEngine, ChatServices},
    config::ServerConfig,
    database::Database,
    llm::{ServiceAccountKey, TokenBroker, VertexAiClient, VertexEmbeddingClient},
    logging,
    routes::CHAT_PATH,
    server::{self, ServerResources},
};
use tracing::{error, info};

/// Connect timeout of outbound HTTP calls
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Overall timeout of outbound HTTP calls; streamed answers must finish within it
const REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Parser)]
#[command(name = "syntia-chat-server")]
#[command(about = "Syntia chat - conversational CRM assistant for medical representatives")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Syntia chat server");
    info!("{}", config.summary());

    let resources = build_resources(&config).await?;
    let router = server::build_router(Arc::new(resources), &config.cors_origins);

    let port = config.http_port;
    info!("=== Available API Endpoints ===");
    info!("   Usage:   GET  http://0.0.0.0:{port}{CHAT_PATH}?action=usage");
    info!("   Chat:    POST http://0.0.0.0:{port}{CHAT_PATH}");
    info!("   Health:  GET  http://0.0.0.0:{port}/health");

    if let Err(e) = server::serve(router, config.http_port).await {
        error!("Server error: {e:#}");
        return Err(e);
    }

    Ok(())
}

/// Wire every collaborator of the chat engine
async fn build_resources(config: &ServerConfig) -> Result<ServerResources> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")?;

    let database = Arc::new(
        Database::connect(&config.database)
            .await
            .context("Failed to connect to the database")?,
    );
    info!("Database pool ready");

    let vertex = &config.vertex;
    let key = ServiceAccountKey::from_base64(vertex.service_account_key.expose())
        .context("Invalid GCP service-account key")?;
    let tokens = Arc::new(
        TokenBroker::new(
            client.clone(),
            &key,
            vertex.token_url.clone(),
            Arc::new(ExpiringCache::new(vertex.token_ttl)),
        )
        .context("Failed to create the GCP token broker")?,
    );
    info!(service_account = %key.client_email, "GCP token broker ready");

    let backend = Arc::new(VertexAiClient::new(
        client.clone(),
        vertex.base_url.clone(),
        vertex.project_id.clone(),
        vertex.location.clone(),
        vertex.model.clone(),
        tokens.clone(),
    ));
    let embedder = Arc::new(VertexEmbeddingClient::new(
        client.clone(),
        &vertex.base_url,
        &vertex.project_id,
        &vertex.embedding_location,
        &vertex.embedding_model,
        vertex.embedding_dimension,
        tokens,
    ));

    let identity = Arc::new(SupabaseIdentityProvider::new(
        client,
        &config.supabase.url,
        config.supabase.service_role_key.clone(),
    ));
    let authenticator = Authenticator::new(identity, database.clone());

    let engine = ChatEngine::new(
        ChatServices {
            conversations: database.clone(),
            config_store: database.clone(),
            usage: database.clone(),
            crm: database,
            backend,
            embedder,
        },
        &config.chat,
    );
    info!(tools = engine.registry().len(), "Chat engine ready");

    Ok(ServerResources::new(engine, authenticator))
}
