// src/receipt.rs
use std::sync::Arc;

use ethers::types::H256;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::types::{SendOutcome, UserOpReceipt};

/// Outcome of a receipt lookup. Only `Found` and `Pending` are normal states
/// for the send pipeline; `Failed` is logged and dropped.
#[derive(Debug)]
pub enum ReceiptLookup {
    Found(UserOpReceipt),
    Pending,
    Failed(String),
}

impl ReceiptLookup {
    pub fn transaction_hash(&self) -> Option<H256> {
        match self {
            ReceiptLookup::Found(receipt) => Some(receipt.transaction_hash),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ReceiptResolver {
    backend: Arc<dyn Backend>,
}

impl ReceiptResolver {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Lookups are scoped by chain; operation hashes are not unique across chains.
    pub async fn resolve(&self, hash: H256, chain_id: u64) -> ReceiptLookup {
        match self.backend.transaction_receipt(chain_id, hash).await {
            Ok(Some(receipt)) => {
                debug!("Operation {:?} mined in {:?}", hash, receipt.transaction_hash);
                ReceiptLookup::Found(receipt)
            }
            Ok(None) => ReceiptLookup::Pending,
            Err(e) => {
                warn!("Receipt lookup for {:?} failed: {}", hash, e);
                ReceiptLookup::Failed(e.to_string())
            }
        }
    }

    /// Never fails: the hash is returned even when no receipt could be read.
    pub async fn outcome(&self, hash: H256, chain_id: u64) -> SendOutcome {
        let lookup = self.resolve(hash, chain_id).await;
        SendOutcome {
            user_op_hash: hash,
            transaction_hash: lookup.transaction_hash(),
        }
    }
}
