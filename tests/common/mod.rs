//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, SEND_EMAILS_TASK_TYPE};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_run_task() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.run_task_by_type(SEND_EMAILS_TASK_TYPE).await;
//!     assert_eq!(response.status(), StatusCode::NO_CONTENT);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
