// src/paymaster.rs
use std::fmt;
use std::sync::Arc;

use ethers::types::Address;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::config::{ChainConfig, ClientOptions, PaymasterKind};
use crate::error::{ClientError, Result};
use crate::rpc::{RpcEndpoint, SPONSOR_USER_OPERATION};
use crate::types::{SponsorResponse, UserOperation};

/// Request/response shaping for one direct-endpoint paymaster.
pub trait PaymasterProvider: Send + Sync + fmt::Debug {
    fn kind(&self) -> PaymasterKind;

    /// Positional parameters for `pm_sponsorUserOperation`.
    fn request_params(&self, op: &UserOperation, entry_point: Address) -> Result<Vec<Value>>;

    fn apply_response(&self, op: UserOperation, response: SponsorResponse) -> UserOperation;
}

fn op_value(op: &UserOperation) -> Result<Value> {
    serde_json::to_value(op).map_err(|e| ClientError::transport(SPONSOR_USER_OPERATION, e))
}

/// Writes `paymasterAndData` and every gas or fee override the paymaster returned.
fn apply_with_overrides(op: UserOperation, response: SponsorResponse) -> UserOperation {
    let call_gas_limit = response.call_gas_limit.unwrap_or(op.call_gas_limit);
    let verification_gas_limit = response
        .verification_gas_limit
        .unwrap_or(op.verification_gas_limit);
    let pre_verification_gas = response
        .pre_verification_gas
        .unwrap_or(op.pre_verification_gas);
    let max_fee_per_gas = response.max_fee_per_gas.unwrap_or(op.max_fee_per_gas);
    let max_priority_fee_per_gas = response
        .max_priority_fee_per_gas
        .unwrap_or(op.max_priority_fee_per_gas);

    op.with_paymaster_and_data(response.paymaster_and_data)
        .with_gas_limits(call_gas_limit, verification_gas_limit, pre_verification_gas)
        .with_fees(max_fee_per_gas, max_priority_fee_per_gas)
}

/// Pay-as-you-go sponsorship; re-estimates gas.
#[derive(Debug, Clone, Default)]
pub struct Stackup;

impl PaymasterProvider for Stackup {
    fn kind(&self) -> PaymasterKind {
        PaymasterKind::Stackup
    }

    fn request_params(&self, op: &UserOperation, entry_point: Address) -> Result<Vec<Value>> {
        Ok(vec![op_value(op)?, json!(entry_point), json!({ "type": "payg" })])
    }

    fn apply_response(&self, op: UserOperation, response: SponsorResponse) -> UserOperation {
        apply_with_overrides(op, response)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pimlico;

impl PaymasterProvider for Pimlico {
    fn kind(&self) -> PaymasterKind {
        PaymasterKind::Pimlico
    }

    fn request_params(&self, op: &UserOperation, entry_point: Address) -> Result<Vec<Value>> {
        Ok(vec![op_value(op)?, json!(entry_point)])
    }

    fn apply_response(&self, op: UserOperation, response: SponsorResponse) -> UserOperation {
        apply_with_overrides(op, response)
    }
}

/// First-party paymaster keyed by a sponsorship id, optionally charging an ERC-20.
#[derive(Debug, Clone, Default)]
pub struct Magmar {
    pub paymaster_id: Option<String>,
    pub erc20_token: Option<Address>,
}

impl PaymasterProvider for Magmar {
    fn kind(&self) -> PaymasterKind {
        PaymasterKind::Magmar
    }

    fn request_params(&self, op: &UserOperation, entry_point: Address) -> Result<Vec<Value>> {
        let mut params = vec![op_value(op)?, json!(entry_point), json!(self.paymaster_id)];
        if let Some(token) = self.erc20_token {
            params.push(json!({ "token": token, "type": "erc20" }));
        }
        Ok(params)
    }

    fn apply_response(&self, op: UserOperation, response: SponsorResponse) -> UserOperation {
        op.with_paymaster_and_data(response.paymaster_and_data)
    }
}

pub fn provider_for(kind: PaymasterKind, options: &ClientOptions) -> Box<dyn PaymasterProvider> {
    match kind {
        PaymasterKind::Stackup => Box::new(Stackup),
        PaymasterKind::Pimlico => Box::new(Pimlico),
        PaymasterKind::Magmar => Box::new(Magmar {
            paymaster_id: options.paymaster_id.clone(),
            erc20_token: options.erc20_token,
        }),
    }
}

/// Where sponsorship data comes from for this session.
pub enum Sponsorship {
    Disabled,
    /// Backend fills `paymasterAndData`; gas limits stay as built.
    Relay {
        backend: Arc<dyn Backend>,
        chain_id: u64,
    },
    Endpoint {
        endpoint: RpcEndpoint,
        provider: Box<dyn PaymasterProvider>,
        entry_point: Address,
    },
}

impl fmt::Debug for Sponsorship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sponsorship::Disabled => f.write_str("Disabled"),
            Sponsorship::Relay { chain_id, .. } => {
                f.debug_struct("Relay").field("chain_id", chain_id).finish()
            }
            Sponsorship::Endpoint {
                endpoint, provider, ..
            } => f
                .debug_struct("Endpoint")
                .field("endpoint", endpoint)
                .field("provider", provider)
                .finish(),
        }
    }
}

impl Sponsorship {
    /// Resolves the sponsorship mode without any network access.
    pub fn from_options(
        options: &ClientOptions,
        chain: &ChainConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        if !options.sponsored {
            return Ok(Sponsorship::Disabled);
        }
        let Some(url) = options.paymaster_endpoint.as_deref() else {
            return Ok(Sponsorship::Relay {
                backend,
                chain_id: chain.chain_id,
            });
        };
        let kind = options
            .paymaster
            .ok_or_else(|| ClientError::config("paymaster not specified"))?;

        Ok(Sponsorship::Endpoint {
            endpoint: RpcEndpoint::new(url)?,
            provider: provider_for(kind, options),
            entry_point: chain.entry_point,
        })
    }

    pub async fn sponsor(&self, op: UserOperation) -> Result<UserOperation> {
        match self {
            Sponsorship::Disabled => Ok(op),
            Sponsorship::Relay { backend, chain_id } => {
                debug!("Requesting paymaster data from backend");
                let sponsored = backend.paymaster_data(*chain_id, &op).await?;
                Ok(op.with_paymaster_and_data(sponsored.paymaster_and_data))
            }
            Sponsorship::Endpoint {
                endpoint,
                provider,
                entry_point,
            } => {
                let params = provider.request_params(&op, *entry_point)?;
                let response: SponsorResponse =
                    endpoint.call(SPONSOR_USER_OPERATION, params).await?;
                info!("Sponsored operation for {:?} via {}", op.sender, provider.kind());
                Ok(provider.apply_response(op, response))
            }
        }
    }
}
