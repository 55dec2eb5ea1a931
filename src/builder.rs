// src/builder.rs
use ethers::abi::AbiEncode;
use ethers::types::{Address, Bytes, U256};

use crate::contracts::{ExecuteBatchCall, ExecuteCall};
use crate::error::{ClientError, Result};
use crate::gas::{FeeQuote, GasPolicy};
use crate::types::{CallIntent, UserOperation};

/// Kernel `Operation.Call`.
const OPERATION_CALL: u8 = 0;

/// What the smart account executes: one call or an ordered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallPlan {
    Single(CallIntent),
    Batch(Vec<CallIntent>),
}

impl CallPlan {
    pub fn batch(intents: Vec<CallIntent>) -> Result<Self> {
        if intents.is_empty() {
            return Err(ClientError::config("batch must contain at least one call"));
        }
        Ok(CallPlan::Batch(intents))
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, CallPlan::Batch(_))
    }

    pub fn encode(&self) -> Bytes {
        match self {
            CallPlan::Single(intent) => encode_execute(intent),
            CallPlan::Batch(intents) => encode_execute_batch(intents),
        }
    }
}

pub fn encode_execute(intent: &CallIntent) -> Bytes {
    ExecuteCall {
        to: intent.target,
        value: intent.value_or_zero(),
        data: intent.data.clone(),
        operation: OPERATION_CALL,
    }
    .encode()
    .into()
}

/// Parallel `to`/`value`/`data` arrays in intent order.
pub fn encode_execute_batch(intents: &[CallIntent]) -> Bytes {
    let (to, (value, data)): (Vec<Address>, (Vec<U256>, Vec<Bytes>)) = intents
        .iter()
        .map(|intent| (intent.target, (intent.value_or_zero(), intent.data.clone())))
        .unzip();

    ExecuteBatchCall {
        to,
        value,
        data,
        operation: OPERATION_CALL,
    }
    .encode()
    .into()
}

/// Assembles an unsponsored, unsigned operation from fixed gas policy and a
/// placeholder signature sized like the real one.
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    policy: GasPolicy,
    dummy_signature: Bytes,
}

impl OperationBuilder {
    pub fn new(policy: GasPolicy, dummy_signature: Bytes) -> Self {
        Self {
            policy,
            dummy_signature,
        }
    }

    pub fn build(
        &self,
        sender: Address,
        nonce: U256,
        init_code: Bytes,
        call_data: Bytes,
        fees: FeeQuote,
    ) -> UserOperation {
        UserOperation {
            sender,
            nonce,
            init_code,
            call_data,
            call_gas_limit: U256::from(self.policy.call_gas_limit),
            verification_gas_limit: U256::from(self.policy.verification_gas_limit),
            pre_verification_gas: U256::from(self.policy.pre_verification_gas),
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            paymaster_and_data: Bytes::default(),
            signature: self.dummy_signature.clone(),
        }
    }
}
