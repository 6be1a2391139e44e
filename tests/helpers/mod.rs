// ABOUTME: Shared test helpers for integration tests
// ABOUTME: Exports the in-process HTTP request driver and local upstream mock servers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod axum_test;
pub mod mock_server;
