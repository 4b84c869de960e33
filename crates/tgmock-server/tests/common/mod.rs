//! Common test utilities for integration tests.

#![allow(dead_code)]

use anyhow::Result;
use reqwest::{Client, Response};
use serde_json::Value;

use tgmock_server::{MockConfig, MockServer, ServerHandle};

/// A mock server bound to an ephemeral port, plus a client for it.
pub struct TestServer {
    pub handle: ServerHandle,
    pub client: Client,
}

impl TestServer {
    /// Start a server with default configuration.
    pub async fn start() -> Result<Self> {
        Self::start_with(MockConfig::default()).await
    }

    /// Start a server with the given configuration.
    pub async fn start_with(config: MockConfig) -> Result<Self> {
        let handle = MockServer::new(config)?.start().await?;
        Ok(Self {
            handle,
            client: Client::new(),
        })
    }

    /// GET a Bot API method.
    pub async fn call(&self, method: &str) -> Result<Response> {
        Ok(self.client.get(self.handle.bot_url(method)).send().await?)
    }

    /// POST a JSON body to a Bot API method.
    pub async fn post(&self, method: &str, body: Value) -> Result<Response> {
        Ok(self
            .client
            .post(self.handle.bot_url(method))
            .json(&body)
            .send()
            .await?)
    }

    /// GET an arbitrary path.
    pub async fn get_path(&self, path: &str) -> Result<Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.handle.base_url(), path))
            .send()
            .await?)
    }

    pub async fn stop(self) -> Result<()> {
        self.handle.shutdown().await?;
        Ok(())
    }
}

/// Update ids of a `getUpdates` reply, in order.
pub fn update_ids(body: &Value) -> Vec<i64> {
    body["result"]
        .as_array()
        .map(|updates| {
            updates
                .iter()
                .filter_map(|u| u["update_id"].as_i64())
                .collect()
        })
        .unwrap_or_default()
}
