// src/gas.rs
use ethers::types::U256;
use tracing::debug;

use crate::chain::ChainReader;
use crate::error::{ClientError, Result};

/// Fixed gas budgets. Nothing here is estimated by simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    pub call_gas_limit: u64,
    pub verification_gas_limit: u64,
    pub pre_verification_gas: u64,
}

impl GasPolicy {
    /// Single call from the direct-key client.
    pub const DIRECT_SINGLE: GasPolicy = GasPolicy {
        call_gas_limit: 2_000_000,
        verification_gas_limit: 2_000_000,
        pre_verification_gas: 200_000,
    };

    /// Batch call from the direct-key client.
    pub const DIRECT_BATCH: GasPolicy = GasPolicy {
        call_gas_limit: 250_000,
        verification_gas_limit: 600_000,
        pre_verification_gas: 200_000,
    };

    /// Single and batch calls from the delegated client.
    pub const DELEGATED: GasPolicy = GasPolicy {
        call_gas_limit: 250_000,
        verification_gas_limit: 600_000,
        pre_verification_gas: 200_000,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl FeeQuote {
    pub fn from_base_fee(base_fee: U256, priority_fee: U256) -> Result<Self> {
        let max_fee_per_gas = base_fee
            .checked_add(priority_fee)
            .ok_or_else(|| {
                ClientError::Estimation(format!("{base_fee} + {priority_fee} overflows max fee"))
            })?;
        Ok(Self {
            max_fee_per_gas,
            max_priority_fee_per_gas: priority_fee,
        })
    }
}

/// Fresh fee quote for every build; base fee moves per block.
pub async fn estimate_fees(reader: &dyn ChainReader, priority_fee: U256) -> Result<FeeQuote> {
    let inputs = reader.fee_inputs().await?;
    // Legacy chains report no base fee; the gas price stands in for it.
    let base_fee = inputs.base_fee.unwrap_or(inputs.gas_price);
    let quote = FeeQuote::from_base_fee(base_fee, priority_fee)?;
    debug!(
        "Fee quote: max fee {} priority {}",
        quote.max_fee_per_gas, quote.max_priority_fee_per_gas
    );
    Ok(quote)
}
