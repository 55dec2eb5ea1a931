// src/chain.rs
use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::*;
use tracing::debug;

use crate::config::ChainConfig;
use crate::contracts::{self, EntryPoint, KernelFactory};
use crate::error::{ClientError, Result};
use crate::types::UserOperation;

/// Fee inputs read from the node for one operation build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeInputs {
    /// `baseFeePerGas` of the latest block, absent on pre-London chains.
    pub base_fee: Option<U256>,
    pub gas_price: U256,
}

/// Read-only chain access used by the operation pipeline.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Counterfactual account address from the Kernel factory.
    async fn account_address(&self, init_payload: Bytes, salt: U256) -> Result<Address>;

    async fn code_at(&self, address: Address) -> Result<Bytes>;

    /// Entry-point nonce for `sender` under key 0.
    async fn nonce(&self, sender: Address) -> Result<U256>;

    async fn fee_inputs(&self) -> Result<FeeInputs>;

    /// `EntryPoint.getUserOpHash`, so the signed digest matches on-chain verification.
    async fn user_op_hash(&self, op: &UserOperation) -> Result<H256>;
}

pub struct EthersChain<M> {
    client: Arc<M>,
    entry_point: EntryPoint<M>,
    factory: KernelFactory<M>,
}

impl EthersChain<Provider<Http>> {
    pub fn connect(rpc_url: &str, chain: &ChainConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ClientError::config(format!("invalid rpc url {rpc_url}: {e}")))?;
        Ok(Self::new(Arc::new(provider), chain))
    }
}

impl<M: Middleware + 'static> EthersChain<M> {
    pub fn new(client: Arc<M>, chain: &ChainConfig) -> Self {
        Self {
            entry_point: EntryPoint::new(chain.entry_point, client.clone()),
            factory: KernelFactory::new(chain.kernel_factory, client.clone()),
            client,
        }
    }

    pub fn client(&self) -> Arc<M> {
        self.client.clone()
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainReader for EthersChain<M> {
    async fn account_address(&self, init_payload: Bytes, salt: U256) -> Result<Address> {
        self.factory
            .get_account_address(init_payload, salt)
            .call()
            .await
            .map_err(|e| ClientError::transport("getAccountAddress", e))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        self.client
            .get_code(address, None)
            .await
            .map_err(|e| ClientError::transport("eth_getCode", e))
    }

    async fn nonce(&self, sender: Address) -> Result<U256> {
        self.entry_point
            .get_nonce(sender, U256::zero())
            .call()
            .await
            .map_err(|e| ClientError::transport("getNonce", e))
    }

    async fn fee_inputs(&self) -> Result<FeeInputs> {
        let (gas_price, block) = tokio::try_join!(
            self.client.get_gas_price(),
            self.client.get_block(BlockNumber::Latest),
        )
        .map_err(|e| ClientError::transport("fee data", e))?;

        let base_fee = block.and_then(|block| block.base_fee_per_gas);
        debug!("Fee inputs: base fee {:?}, gas price {}", base_fee, gas_price);
        Ok(FeeInputs {
            base_fee,
            gas_price,
        })
    }

    async fn user_op_hash(&self, op: &UserOperation) -> Result<H256> {
        let hash = self
            .entry_point
            .get_user_op_hash(contracts::UserOperation::from(op))
            .call()
            .await
            .map_err(|e| ClientError::transport("getUserOpHash", e))?;
        Ok(H256::from(hash))
    }
}
