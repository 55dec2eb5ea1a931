// src/testutil.rs
//! In-memory chain and backend doubles for unit tests.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::signers::LocalWallet;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;

use crate::backend::{AccountCreated, AccountCreation, Backend, OtpDispatch};
use crate::chain::{ChainReader, FeeInputs};
use crate::error::{ClientError, Result};
use crate::types::{UserOpReceipt, UserOperation};

pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const VALID_OTP: &str = "123456";

pub fn test_wallet() -> LocalWallet {
    TEST_PRIVATE_KEY.parse().unwrap()
}

pub struct FakeChain {
    deployed: bool,
    nonce: U256,
    base_fee: Option<U256>,
    gas_price: U256,
    calls: AtomicUsize,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            deployed: false,
            nonce: U256::zero(),
            base_fee: Some(U256::from(1_000_000_000u64)),
            gas_price: U256::from(2_000_000_000u64),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeChain {
    pub fn deployed(mut self) -> Self {
        self.deployed = true;
        self
    }

    pub fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_base_fee(mut self, base_fee: Option<U256>) -> Self {
        self.base_fee = base_fee;
        self
    }

    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn account_address(&self, init_payload: Bytes, salt: U256) -> Result<Address> {
        self.touch();
        let mut preimage = init_payload.to_vec();
        let mut salt_bytes = [0u8; 32];
        salt.to_big_endian(&mut salt_bytes);
        preimage.extend_from_slice(&salt_bytes);
        Ok(Address::from_slice(&keccak256(preimage)[12..]))
    }

    async fn code_at(&self, _address: Address) -> Result<Bytes> {
        self.touch();
        Ok(if self.deployed {
            Bytes::from(vec![0x60, 0x80])
        } else {
            Bytes::default()
        })
    }

    async fn nonce(&self, _sender: Address) -> Result<U256> {
        self.touch();
        Ok(self.nonce)
    }

    async fn fee_inputs(&self) -> Result<FeeInputs> {
        self.touch();
        Ok(FeeInputs {
            base_fee: self.base_fee,
            gas_price: self.gas_price,
        })
    }

    async fn user_op_hash(&self, op: &UserOperation) -> Result<H256> {
        self.touch();
        let encoded = serde_json::to_vec(op).unwrap();
        Ok(H256::from(keccak256(encoded)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Found,
    Missing,
    Failing,
}

pub struct FakeBackend {
    api_key_valid: bool,
    receipts: ReceiptMode,
    relay_failure: Option<u16>,
    calls: AtomicUsize,
    receipt_queries: Mutex<Vec<(u64, H256)>>,
    created: Mutex<Vec<AccountCreation>>,
    submitted: Mutex<Vec<UserOperation>>,
    prepared: Mutex<Vec<UserOperation>>,
    otps_sent: Mutex<Vec<(String, String)>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            api_key_valid: true,
            receipts: ReceiptMode::Found,
            relay_failure: None,
            calls: AtomicUsize::new(0),
            receipt_queries: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            prepared: Mutex::new(Vec::new()),
            otps_sent: Mutex::new(Vec::new()),
        }
    }
}

impl FakeBackend {
    pub fn rejecting_api_key() -> Self {
        Self {
            api_key_valid: false,
            ..Default::default()
        }
    }

    pub fn with_receipts(mut self, mode: ReceiptMode) -> Self {
        self.receipts = mode;
        self
    }

    /// Authorized relay fails with `status` after the OTP was accepted.
    pub fn with_relay_failure(mut self, status: u16) -> Self {
        self.relay_failure = Some(status);
        self
    }

    pub fn op_hash() -> H256 {
        H256::repeat_byte(0xab)
    }

    pub fn tx_hash() -> H256 {
        H256::repeat_byte(0xcd)
    }

    pub fn paymaster_and_data() -> Bytes {
        Bytes::from(vec![0x99; 20])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn receipt_queries(&self) -> Vec<(u64, H256)> {
        self.receipt_queries.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<AccountCreation> {
        self.created.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<UserOperation> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn prepared(&self) -> Vec<UserOperation> {
        self.prepared.lock().unwrap().clone()
    }

    pub fn otps_sent(&self) -> Vec<(String, String)> {
        self.otps_sent.lock().unwrap().clone()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn check_otp(&self, request_id: &str, otp: &str) -> Result<UserOperation> {
        let index: usize = request_id
            .strip_prefix("req-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ClientError::Application {
                status: 404,
                message: "request not found".to_string(),
            })?;
        if otp != VALID_OTP {
            return Err(ClientError::Application {
                status: 400,
                message: "invalid otp".to_string(),
            });
        }
        let op = self.prepared.lock().unwrap().get(index).cloned().ok_or_else(|| {
            ClientError::Application {
                status: 404,
                message: "request not found".to_string(),
            }
        })?;
        Ok(op.with_signature(Bytes::from(vec![0x01; 69])))
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn verify_api_key(&self) -> Result<bool> {
        self.touch();
        Ok(self.api_key_valid)
    }

    async fn paymaster_data(&self, _chain_id: u64, op: &UserOperation) -> Result<UserOperation> {
        self.touch();
        Ok(op
            .clone()
            .with_paymaster_and_data(Self::paymaster_and_data())
            .with_gas_limits(U256::from(1), U256::from(1), U256::from(1)))
    }

    async fn send_to_bundler(&self, _chain_id: u64, op: &UserOperation) -> Result<H256> {
        self.touch();
        self.submitted.lock().unwrap().push(op.clone());
        Ok(Self::op_hash())
    }

    async fn transaction_receipt(&self, chain_id: u64, hash: H256) -> Result<Option<UserOpReceipt>> {
        self.touch();
        self.receipt_queries.lock().unwrap().push((chain_id, hash));
        match self.receipts {
            ReceiptMode::Found => Ok(Some(UserOpReceipt {
                transaction_hash: Self::tx_hash(),
                extra: Default::default(),
            })),
            ReceiptMode::Missing => Ok(None),
            ReceiptMode::Failing => Err(ClientError::Transport("receipt service down".to_string())),
        }
    }

    async fn create_account(&self, request: &AccountCreation) -> Result<AccountCreated> {
        self.touch();
        self.created.lock().unwrap().push(request.clone());
        Ok(AccountCreated::default())
    }

    async fn log_prepared_operation(
        &self,
        _chain_id: u64,
        op: &UserOperation,
        _telegram_user_id: &str,
    ) -> Result<String> {
        self.touch();
        let mut prepared = self.prepared.lock().unwrap();
        prepared.push(op.clone());
        Ok(format!("req-{}", prepared.len() - 1))
    }

    async fn send_otp(&self, telegram_user_id: &str, request_id: &str) -> Result<OtpDispatch> {
        self.touch();
        self.otps_sent
            .lock()
            .unwrap()
            .push((telegram_user_id.to_string(), request_id.to_string()));
        Ok(OtpDispatch {
            request_id: Some(request_id.to_string()),
            otp_sent: Some(serde_json::Value::Bool(true)),
        })
    }

    async fn verify_otp(
        &self,
        request_id: &str,
        _telegram_user_id: &str,
        otp: &str,
    ) -> Result<UserOperation> {
        self.touch();
        self.check_otp(request_id, otp)
    }

    async fn send_authorized(
        &self,
        request_id: &str,
        _telegram_user_id: &str,
        otp: &str,
    ) -> Result<H256> {
        self.touch();
        let op = self.check_otp(request_id, otp)?;
        if let Some(status) = self.relay_failure {
            return Err(ClientError::Application {
                status,
                message: "bundler: AA21 didn't pay prefund".to_string(),
            });
        }
        self.submitted.lock().unwrap().push(op);
        Ok(Self::op_hash())
    }
}
