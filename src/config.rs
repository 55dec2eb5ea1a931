// src/config.rs
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::signer::OwnerSigner;

pub const DEFAULT_API_URL: &str = "https://api.magmar.xyz";

/// How long a prepared delegated operation waits for its OTP confirmation.
pub const DEFAULT_AUTHORIZATION_TTL: Duration = Duration::from_secs(600);

/// 1.5 gwei.
const PRIORITY_FEE_WEI: u64 = 1_500_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Main,
    Test,
}

struct ChainEntry {
    chain_id: u64,
    network: Network,
    entry_point: &'static str,
    kernel_factory: &'static str,
    kernel_implementation: &'static str,
    ecdsa_validator: &'static str,
}

const SUPPORTED_CHAINS: &[ChainEntry] = &[
    ChainEntry {
        chain_id: 1,
        network: Network::Main,
        entry_point: "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
        kernel_factory: "0x4af5E890f00cF2ffAcDA975cFD1Ae40F53647A10",
        kernel_implementation: "0x443a3b1D15aa72983035B89e4ab02836dC3A96CA",
        ecdsa_validator: "0x1647D92D3c2D2305F3511a732c8183F3eC15a295",
    },
    ChainEntry {
        chain_id: 11155111,
        network: Network::Test,
        entry_point: "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789",
        kernel_factory: "0x4af5E890f00cF2ffAcDA975cFD1Ae40F53647A10",
        kernel_implementation: "0x443a3b1D15aa72983035B89e4ab02836dC3A96CA",
        ecdsa_validator: "0x1647D92D3c2D2305F3511a732c8183F3eC15a295",
    },
];

/// Contract addresses and fee policy for one supported chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub network: Network,
    pub entry_point: Address,
    pub kernel_factory: Address,
    pub kernel_implementation: Address,
    pub ecdsa_validator: Address,
    pub salt: U256,
    pub priority_fee: U256,
}

impl ChainConfig {
    pub fn for_chain(chain_id: u64) -> Result<Self> {
        let entry = SUPPORTED_CHAINS
            .iter()
            .find(|entry| entry.chain_id == chain_id)
            .ok_or_else(|| ClientError::config(format!("chainId {chain_id} not supported")))?;

        Ok(Self {
            chain_id,
            network: entry.network,
            entry_point: parse_address(entry.entry_point)?,
            kernel_factory: parse_address(entry.kernel_factory)?,
            kernel_implementation: parse_address(entry.kernel_implementation)?,
            ecdsa_validator: parse_address(entry.ecdsa_validator)?,
            salt: U256::zero(),
            priority_fee: U256::from(PRIORITY_FEE_WEI),
        })
    }

    pub fn is_main(&self) -> bool {
        self.network == Network::Main
    }

    pub fn supported_chain_ids(network: Network) -> impl Iterator<Item = u64> {
        SUPPORTED_CHAINS
            .iter()
            .filter(move |entry| entry.network == network)
            .map(|entry| entry.chain_id)
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| ClientError::config(format!("invalid address {raw}: {e}")))
}

/// Direct-endpoint paymaster integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymasterKind {
    Stackup,
    Pimlico,
    Magmar,
}

impl fmt::Display for PaymasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymasterKind::Stackup => "STACKUP",
            PaymasterKind::Pimlico => "PIMLICO",
            PaymasterKind::Magmar => "MAGMAR",
        };
        f.write_str(name)
    }
}

impl FromStr for PaymasterKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "STACKUP" => Ok(PaymasterKind::Stackup),
            "PIMLICO" => Ok(PaymasterKind::Pimlico),
            "MAGMAR" => Ok(PaymasterKind::Magmar),
            other => Err(ClientError::config(format!("unknown paymaster {other}"))),
        }
    }
}

/// Session options shared by the direct and delegated clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default, rename = "isSponsoredTrx")]
    pub sponsored: bool,
    #[serde(default)]
    pub paymaster: Option<PaymasterKind>,
    #[serde(default)]
    pub paymaster_endpoint: Option<String>,
    #[serde(default)]
    pub paymaster_id: Option<String>,
    #[serde(default, rename = "erc20token")]
    pub erc20_token: Option<Address>,
    #[serde(default)]
    pub bundler_endpoint: Option<String>,
    #[serde(default)]
    pub no_account_create_sponsorship: bool,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub authorization_ttl_secs: Option<u64>,
}

impl ClientOptions {
    pub fn new(chain_id: u64, rpc_url: impl Into<String>) -> Self {
        Self {
            chain_id,
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Checks everything that can be checked without touching the network and
    /// resolves the chain table entry.
    pub fn validate(&self, api_key: &str) -> Result<ChainConfig> {
        if api_key.is_empty() {
            return Err(ClientError::config("api key not provided during init"));
        }
        if self.chain_id == 0 {
            return Err(ClientError::config("chainId not provided in options"));
        }
        let chain = ChainConfig::for_chain(self.chain_id)?;

        if self.sponsored && chain.is_main() && self.paymaster_endpoint.is_none() {
            return Err(ClientError::config(
                "paymaster endpoint required for sponsored trx on mainnet chains",
            ));
        }
        if self.sponsored && self.paymaster_endpoint.is_some() && self.paymaster.is_none() {
            return Err(ClientError::config("paymaster not specified"));
        }
        Ok(chain)
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn authorization_ttl(&self) -> Duration {
        self.authorization_ttl_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AUTHORIZATION_TTL)
    }
}

/// Key material for the direct client.
#[derive(Clone)]
pub enum OwnerCredential {
    /// Hex-encoded secp256k1 private key.
    PrivateKey(String),
    Signer(Arc<dyn OwnerSigner>),
}

impl fmt::Debug for OwnerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerCredential::PrivateKey(_) => f.write_str("PrivateKey(..)"),
            OwnerCredential::Signer(signer) => {
                f.debug_tuple("Signer").field(&signer.address()).finish()
            }
        }
    }
}

/// Identity of a wallet whose key lives behind the backend's OTP authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedIdentity {
    pub wallet_address: Address,
    pub telegram_user_id: String,
}
