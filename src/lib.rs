// src/lib.rs
//! Client for ERC-4337 Kernel smart accounts: derives the account, builds,
//! sponsors, signs and submits user operations through the Magmar backend or
//! directly configured paymaster and bundler endpoints.

pub mod account;
pub mod backend;
pub mod builder;
pub mod chain;
pub mod client;
pub mod config;
pub mod contracts;
pub mod delegated;
pub mod error;
pub mod funds;
pub mod gas;
pub mod paymaster;
pub mod receipt;
pub mod rpc;
pub mod signer;
pub mod submit;
pub mod types;

#[cfg(test)]
mod testutil;

pub use backend::{Backend, HttpBackend};
pub use chain::{ChainReader, EthersChain};
pub use client::{Components, DirectClient};
pub use config::{ChainConfig, ClientOptions, DelegatedIdentity, OwnerCredential, PaymasterKind};
pub use delegated::{DelegatedClient, PreparedSend};
pub use error::{ClientError, Result};
pub use receipt::ReceiptLookup;
pub use signer::OwnerSigner;
pub use types::{CallIntent, SendOutcome, UserOperation};
