// src/rpc.rs
use std::fmt;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{ClientError, Result};

pub const SEND_USER_OPERATION: &str = "eth_sendUserOperation";
pub const SPONSOR_USER_OPERATION: &str = "pm_sponsorUserOperation";

/// JSON-RPC endpoint of a bundler or paymaster service.
#[derive(Clone)]
pub struct RpcEndpoint {
    url: String,
    client: HttpClient,
}

impl fmt::Debug for RpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcEndpoint").field("url", &self.url).finish()
    }
}

impl RpcEndpoint {
    pub fn new(url: &str) -> Result<Self> {
        let client = HttpClientBuilder::default()
            .build(url)
            .map_err(|e| ClientError::config(format!("invalid endpoint {url}: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Positional-parameter call.
    pub async fn call<R>(&self, method: &str, params: Vec<Value>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let mut array = ArrayParams::new();
        for param in params {
            array
                .insert(param)
                .map_err(|e| ClientError::transport(method, e))?;
        }

        debug!("Calling {} on {}", method, self.url);
        self.client
            .request::<R, _>(method, array)
            .await
            .map_err(|e| {
                error!("{} failed on {}: {}", method, self.url, e);
                ClientError::transport(method, e)
            })
    }
}
