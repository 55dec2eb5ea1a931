// src/funds.rs
//! Entry-point deposit top-ups paid by the owner EOA.
use std::sync::Arc;

use ethers::prelude::*;
use tracing::info;

use crate::contracts::EntryPoint;
use crate::error::{ClientError, Result};

/// Owner wallet connected to the chain for plain transactions.
pub type WalletClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct EntryPointFunds<M> {
    entry_point: EntryPoint<M>,
}

impl<M: Middleware + 'static> EntryPointFunds<M> {
    pub fn new(client: Arc<M>, entry_point: Address) -> Self {
        Self {
            entry_point: EntryPoint::new(entry_point, client),
        }
    }

    /// `depositTo(account)` with `value` wei attached.
    pub async fn deposit(&self, account: Address, value: U256) -> Result<TxHash> {
        let call = self.entry_point.deposit_to(account).value(value);
        let pending = call
            .send()
            .await
            .map_err(|e| ClientError::transport("depositTo", e))?;
        let hash = pending.tx_hash();
        info!("Deposited {} wei for {:?} in {:?}", value, account, hash);
        Ok(hash)
    }

    pub async fn balance(&self, account: Address) -> Result<U256> {
        self.entry_point
            .balance_of(account)
            .call()
            .await
            .map_err(|e| ClientError::transport("balanceOf", e))
    }
}
