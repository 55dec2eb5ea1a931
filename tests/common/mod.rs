// tests/common/mod.rs
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use jsonrpsee::core::{async_trait as rpc_async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use serde_json::{json, Value};

use magmar_aa::backend::{AccountCreated, AccountCreation, OtpDispatch};
use magmar_aa::chain::FeeInputs;
use magmar_aa::types::UserOpReceipt;
use magmar_aa::{Backend, ChainReader, ClientError, Result, UserOperation};

pub const OWNER_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn owner_wallet() -> LocalWallet {
    OWNER_KEY.parse().unwrap()
}

pub fn paymaster_and_data() -> Bytes {
    Bytes::from(vec![0x77; 20])
}

/// Chain with a deployed account at nonce 7 and a 1 gwei base fee.
#[derive(Default)]
pub struct StaticChain;

#[async_trait]
impl ChainReader for StaticChain {
    async fn account_address(&self, init_payload: Bytes, salt: U256) -> Result<Address> {
        let mut preimage = init_payload.to_vec();
        let mut salt_bytes = [0u8; 32];
        salt.to_big_endian(&mut salt_bytes);
        preimage.extend_from_slice(&salt_bytes);
        Ok(Address::from_slice(&keccak256(preimage)[12..]))
    }

    async fn code_at(&self, _address: Address) -> Result<Bytes> {
        Ok(Bytes::from(vec![0x60, 0x80]))
    }

    async fn nonce(&self, _sender: Address) -> Result<U256> {
        Ok(U256::from(7))
    }

    async fn fee_inputs(&self) -> Result<FeeInputs> {
        Ok(FeeInputs {
            base_fee: Some(U256::from(1_000_000_000u64)),
            gas_price: U256::from(1_000_000_000u64),
        })
    }

    async fn user_op_hash(&self, op: &UserOperation) -> Result<H256> {
        let encoded = serde_json::to_vec(op).map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(H256::from(keccak256(encoded)))
    }
}

/// Backend that accepts the key, has no receipts indexed yet and hands out a
/// signed copy of the last prepared operation.
#[derive(Default)]
pub struct QuietBackend {
    prepared: Mutex<Vec<UserOperation>>,
    relayed: Mutex<usize>,
}

impl QuietBackend {
    pub fn relayed(&self) -> usize {
        *self.relayed.lock().unwrap()
    }
}

#[async_trait]
impl Backend for QuietBackend {
    async fn verify_api_key(&self) -> Result<bool> {
        Ok(true)
    }

    async fn paymaster_data(&self, _chain_id: u64, op: &UserOperation) -> Result<UserOperation> {
        Ok(op.clone())
    }

    async fn send_to_bundler(&self, _chain_id: u64, _op: &UserOperation) -> Result<H256> {
        *self.relayed.lock().unwrap() += 1;
        Ok(H256::repeat_byte(0x01))
    }

    async fn transaction_receipt(&self, _chain_id: u64, _hash: H256) -> Result<Option<UserOpReceipt>> {
        Ok(None)
    }

    async fn create_account(&self, _request: &AccountCreation) -> Result<AccountCreated> {
        Ok(AccountCreated::default())
    }

    async fn log_prepared_operation(
        &self,
        _chain_id: u64,
        op: &UserOperation,
        _telegram_user_id: &str,
    ) -> Result<String> {
        self.prepared.lock().unwrap().push(op.clone());
        Ok("prepared-1".to_string())
    }

    async fn send_otp(&self, _telegram_user_id: &str, request_id: &str) -> Result<OtpDispatch> {
        Ok(OtpDispatch {
            request_id: Some(request_id.to_string()),
            otp_sent: Some(Value::Bool(true)),
        })
    }

    async fn verify_otp(
        &self,
        _request_id: &str,
        _telegram_user_id: &str,
        _otp: &str,
    ) -> Result<UserOperation> {
        let op = self.prepared.lock().unwrap().last().cloned().ok_or_else(|| {
            ClientError::Application {
                status: 404,
                message: "request not found".to_string(),
            }
        })?;
        Ok(op.with_signature(Bytes::from(vec![0x02; 69])))
    }

    async fn send_authorized(
        &self,
        _request_id: &str,
        _telegram_user_id: &str,
        _otp: &str,
    ) -> Result<H256> {
        *self.relayed.lock().unwrap() += 1;
        Ok(H256::repeat_byte(0x01))
    }
}

/// Params of every call a fake service received.
pub type Recorded = Arc<Mutex<Vec<Vec<Value>>>>;

/// Paymaster answering `pm_sponsorUserOperation` with a fixed response body.
pub async fn start_paymaster(response: Value) -> anyhow::Result<(SocketAddr, ServerHandle, Recorded)> {
    let recorded: Recorded = Arc::default();
    let server = ServerBuilder::default().build("127.0.0.1:0").await?;
    let addr = server.local_addr()?;

    let mut module = RpcModule::new((recorded.clone(), response));
    module.register_async_method("pm_sponsorUserOperation", |params, context| async move {
        let params = params.parse::<Vec<Value>>()?;
        let (recorded, response) = context.as_ref();
        recorded.lock().unwrap().push(params);
        Ok::<_, ErrorObjectOwned>(response.clone())
    })?;

    Ok((addr, server.start(module), recorded))
}

#[rpc(server, namespace = "eth")]
pub trait Bundler {
    #[method(name = "sendUserOperation")]
    async fn send_user_operation(&self, op: Value, entry_point: Address) -> RpcResult<H256>;
}

pub struct FakeBundler {
    recorded: Recorded,
    reject: bool,
}

#[rpc_async_trait]
impl BundlerServer for FakeBundler {
    async fn send_user_operation(&self, op: Value, entry_point: Address) -> RpcResult<H256> {
        if self.reject {
            return Err(ErrorObjectOwned::owned(
                -32500,
                "AA21 didn't pay prefund",
                None::<()>,
            ));
        }
        let hash = H256::from(keccak256(op.to_string()));
        self.recorded
            .lock()
            .unwrap()
            .push(vec![op, json!(entry_point)]);
        Ok(hash)
    }
}

pub async fn start_bundler(reject: bool) -> anyhow::Result<(SocketAddr, ServerHandle, Recorded)> {
    let recorded: Recorded = Arc::default();
    let server = ServerBuilder::default().build("127.0.0.1:0").await?;
    let addr = server.local_addr()?;
    let bundler = FakeBundler {
        recorded: recorded.clone(),
        reject,
    };
    Ok((addr, server.start(bundler.into_rpc()), recorded))
}

pub fn url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}
