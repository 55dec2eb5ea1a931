// src/submit.rs
use std::sync::Arc;

use ethers::types::{Address, H256};
use serde_json::json;
use tracing::info;

use crate::backend::Backend;
use crate::error::{ClientError, Result};
use crate::rpc::{RpcEndpoint, SEND_USER_OPERATION};
use crate::types::UserOperation;

/// Delivers signed operations to a bundler, either directly or through the backend.
pub enum Submitter {
    Bundler {
        endpoint: RpcEndpoint,
        entry_point: Address,
    },
    Relay {
        backend: Arc<dyn Backend>,
        chain_id: u64,
    },
}

impl Submitter {
    pub fn new(
        bundler_endpoint: Option<&str>,
        entry_point: Address,
        backend: Arc<dyn Backend>,
        chain_id: u64,
    ) -> Result<Self> {
        Ok(match bundler_endpoint {
            Some(url) => Submitter::Bundler {
                endpoint: RpcEndpoint::new(url)?,
                entry_point,
            },
            None => Submitter::Relay { backend, chain_id },
        })
    }

    pub fn uses_bundler(&self) -> bool {
        matches!(self, Submitter::Bundler { .. })
    }

    pub async fn submit(&self, op: &UserOperation) -> Result<H256> {
        let hash = match self {
            Submitter::Bundler {
                endpoint,
                entry_point,
            } => {
                let op = serde_json::to_value(op)
                    .map_err(|e| ClientError::Submission(e.to_string()))?;
                endpoint
                    .call::<H256>(SEND_USER_OPERATION, vec![op, json!(entry_point)])
                    .await
                    .map_err(|e| {
                        ClientError::Submission(format!(
                            "error while sending trx through given bundler endpoint: {e}"
                        ))
                    })?
            }
            Submitter::Relay { backend, chain_id } => {
                backend.send_to_bundler(*chain_id, op).await?
            }
        };
        info!("Submitted user operation {:?}", hash);
        Ok(hash)
    }
}
