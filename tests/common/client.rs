//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all endpoints of the server.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::cookie::Jar;
use reqwest::Response;
use std::sync::Arc;
use std::time::Duration;

/// HTTP test client with cookie or header based admin sessions
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new client without any session
    ///
    /// This is what the scheduler looks like to the server.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client carrying the admin session cookie
    pub fn authenticated_admin(base_url: String) -> Self {
        Self::with_session_cookie(base_url, ADMIN_TOKEN)
    }

    /// Creates a client sending `token` as the `session_token` cookie
    pub fn with_session_cookie(base_url: String, token: &str) -> Self {
        let jar = Jar::default();
        let url = base_url.parse().expect("Invalid base url");
        jar.add_cookie_str(&format!("session_token={}", token), &url);

        let client = reqwest::Client::builder()
            .cookie_provider(Arc::new(jar))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client sending `token` in the Authorization header
    pub fn with_bearer_token(base_url: String, token: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).expect("Invalid token"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Server
    // ========================================================================

    /// GET / - server stats
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Run Task Endpoints
    // ========================================================================

    /// POST /scheduletask/runtask - the host's run-by-type entry point
    pub async fn run_task_by_type(&self, task_type: &str) -> Response {
        self.client
            .post(format!("{}/scheduletask/runtask", self.base_url))
            .query(&[("taskType", task_type)])
            .send()
            .await
            .expect("Run task request failed")
    }

    /// POST /admin/scheduletask/runnow/{id} - the host's run-by-id entry point
    pub async fn run_task_now(&self, id: i64) -> Response {
        self.client
            .post(format!("{}/admin/scheduletask/runnow/{}", self.base_url, id))
            .send()
            .await
            .expect("Run now request failed")
    }

    // ========================================================================
    // Event Log Endpoints
    // ========================================================================

    /// GET /admin/scheduletasklog/list with raw query pairs
    pub async fn list_events(&self, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}/admin/scheduletasklog/list", self.base_url))
            .query(query)
            .send()
            .await
            .expect("List events request failed")
    }

    /// GET /admin/scheduletasklog/events/{id}
    pub async fn get_event(&self, id: i64) -> Response {
        self.client
            .get(format!("{}/admin/scheduletasklog/events/{}", self.base_url, id))
            .send()
            .await
            .expect("Get event request failed")
    }

    /// POST /admin/scheduletasklog/clear
    pub async fn clear_events(&self) -> Response {
        self.client
            .post(format!("{}/admin/scheduletasklog/clear", self.base_url))
            .send()
            .await
            .expect("Clear events request failed")
    }

    /// GET /admin/scheduletasklog/options/{kind}
    pub async fn get_options(&self, kind: &str) -> Response {
        self.client
            .get(format!("{}/admin/scheduletasklog/options/{}", self.base_url, kind))
            .send()
            .await
            .expect("Get options request failed")
    }

    // ========================================================================
    // Settings Endpoints
    // ========================================================================

    /// GET /admin/scheduletasklog/settings
    pub async fn get_settings(&self) -> Response {
        self.client
            .get(format!("{}/admin/scheduletasklog/settings", self.base_url))
            .send()
            .await
            .expect("Get settings request failed")
    }

    /// PUT /admin/scheduletasklog/settings
    pub async fn update_settings(&self, body: serde_json::Value) -> Response {
        self.client
            .put(format!("{}/admin/scheduletasklog/settings", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Update settings request failed")
    }
}
