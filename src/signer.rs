// src/signer.rs
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, Signature};
use ethers::utils::keccak256;
use tracing::debug;

use crate::chain::ChainReader;
use crate::error::{ClientError, Result};
use crate::types::UserOperation;

/// Kernel validator-mode selector prepended to every signature.
pub const VALIDATOR_MODE_PREFIX: [u8; 4] = [0u8; 4];

/// Owner key able to sign a 32-byte digest as an EIP-191 message.
#[async_trait]
pub trait OwnerSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_digest(&self, digest: [u8; 32]) -> Result<Signature>;
}

#[async_trait]
impl<S> OwnerSigner for S
where
    S: ethers::signers::Signer + Send + Sync,
{
    fn address(&self) -> Address {
        ethers::signers::Signer::address(self)
    }

    async fn sign_digest(&self, digest: [u8; 32]) -> Result<Signature> {
        self.sign_message(digest)
            .await
            .map_err(|e| ClientError::Signing(e.to_string()))
    }
}

fn with_prefix(signature: &Signature) -> Bytes {
    let mut padded = VALIDATOR_MODE_PREFIX.to_vec();
    padded.extend_from_slice(&signature.to_vec());
    Bytes::from(padded)
}

/// Signs operations with the owner key over the entry point's canonical hash.
#[derive(Clone)]
pub struct OperationSigner {
    reader: Arc<dyn ChainReader>,
    owner: Arc<dyn OwnerSigner>,
}

impl OperationSigner {
    pub fn new(reader: Arc<dyn ChainReader>, owner: Arc<dyn OwnerSigner>) -> Self {
        Self { reader, owner }
    }

    pub fn owner(&self) -> Address {
        self.owner.address()
    }

    /// Correctly sized placeholder: prefix ‖ signature over `keccak256(0xdead)`.
    pub async fn dummy_signature(&self) -> Result<Bytes> {
        let signature = self.owner.sign_digest(keccak256([0xde, 0xad])).await?;
        Ok(with_prefix(&signature))
    }

    pub async fn sign(&self, op: UserOperation) -> Result<UserOperation> {
        let hash = self.reader.user_op_hash(&op).await?;
        debug!("Signing user operation hash {:?}", hash);
        let signature = self.owner.sign_digest(hash.to_fixed_bytes()).await?;
        Ok(op.with_signature(with_prefix(&signature)))
    }
}
