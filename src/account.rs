// src/account.rs
//! Smart-account address derivation and deployment detection.
use ethers::abi::AbiEncode;
use ethers::types::{Address, Bytes, U256};
use tracing::debug;

use crate::chain::ChainReader;
use crate::config::ChainConfig;
use crate::contracts::{CreateAccountCall, InitializeCall};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Deployed,
    Undeployed,
}

impl Deployment {
    pub fn is_deployed(self) -> bool {
        self == Deployment::Deployed
    }
}

/// `initialize(validator, abi.encodePacked(owner))` calldata bound to the chain's
/// ECDSA validator.
pub fn initialization_payload(chain: &ChainConfig, owner: Address) -> Bytes {
    InitializeCall {
        default_validator: chain.ecdsa_validator,
        data: Bytes::from(owner.as_bytes().to_vec()),
    }
    .encode()
    .into()
}

/// Init-code that lets the entry point deploy the account itself:
/// `factory ‖ createAccount(implementation, payload, salt)`.
pub fn init_code(chain: &ChainConfig, owner: Address) -> Bytes {
    let create = CreateAccountCall {
        implementation: chain.kernel_implementation,
        data: initialization_payload(chain, owner),
        index: chain.salt,
    }
    .encode();

    let mut code = chain.kernel_factory.as_bytes().to_vec();
    code.extend_from_slice(&create);
    Bytes::from(code)
}

pub async fn derive_address(
    reader: &dyn ChainReader,
    chain: &ChainConfig,
    owner: Address,
) -> Result<Address> {
    let payload = initialization_payload(chain, owner);
    let address = reader.account_address(payload, chain.salt).await?;
    debug!("Derived smart account {:?} for owner {:?}", address, owner);
    Ok(address)
}

pub async fn deployment(reader: &dyn ChainReader, address: Address) -> Result<Deployment> {
    let code = reader.code_at(address).await?;
    Ok(if code.is_empty() {
        Deployment::Undeployed
    } else {
        Deployment::Deployed
    })
}

/// Nonce to use for the next operation; undeployed accounts start at zero.
pub async fn next_nonce(
    reader: &dyn ChainReader,
    address: Address,
    status: Deployment,
) -> Result<U256> {
    match status {
        Deployment::Deployed => reader.nonce(address).await,
        Deployment::Undeployed => Ok(U256::zero()),
    }
}
