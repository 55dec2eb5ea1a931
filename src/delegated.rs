// src/delegated.rs
//! Session for wallets whose key is held by the backend and released per
//! operation through a one-time password.
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, Bytes, U256};
use moka::future::Cache;
use tracing::{debug, info, warn};

use crate::account::{self, Deployment};
use crate::backend::{AccountCreation, Backend, HttpBackend};
use crate::builder::{CallPlan, OperationBuilder};
use crate::chain::{ChainReader, EthersChain};
use crate::config::{ChainConfig, ClientOptions, DelegatedIdentity};
use crate::error::{ClientError, Result};
use crate::gas::{self, GasPolicy};
use crate::paymaster::Sponsorship;
use crate::receipt::{ReceiptLookup, ReceiptResolver};
use crate::submit::Submitter;
use crate::types::{CallIntent, SendOutcome, UserOperation};

/// Handle returned by a prepare call; confirm with the OTP the user received.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSend {
    pub request_id: String,
    pub otp_sent: Option<serde_json::Value>,
}

/// Request ids issued by this session. Each may be confirmed once, before it expires.
pub struct PendingRequests {
    entries: Cache<String, ()>,
}

impl PendingRequests {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub async fn register(&self, request_id: &str) {
        self.entries.insert(request_id.to_string(), ()).await;
    }

    /// Removes the id whatever the outcome, so a failed confirmation cannot be retried.
    pub async fn take(&self, request_id: &str) -> Result<()> {
        let live = self.entries.get(request_id).await.is_some();
        let removed = self.entries.remove(request_id).await.is_some();
        if live && removed {
            Ok(())
        } else {
            Err(ClientError::Authorization(format!(
                "request {request_id} is unknown, expired or already consumed"
            )))
        }
    }
}

pub struct DelegatedClient {
    chain: ChainConfig,
    identity: DelegatedIdentity,
    reader: Arc<dyn ChainReader>,
    backend: Arc<dyn Backend>,
    sponsorship: Sponsorship,
    submitter: Submitter,
    receipts: ReceiptResolver,
    account: Address,
    pending: PendingRequests,
}

impl DelegatedClient {
    pub async fn init(
        api_key: &str,
        options: ClientOptions,
        identity: DelegatedIdentity,
    ) -> Result<Self> {
        let chain = options.validate(api_key)?;
        let reader = Arc::new(EthersChain::connect(&options.rpc_url, &chain)?);
        let backend = Arc::new(HttpBackend::new(options.api_url(), api_key));
        Self::with_components(api_key, options, identity, reader, backend).await
    }

    pub async fn with_components(
        api_key: &str,
        options: ClientOptions,
        identity: DelegatedIdentity,
        reader: Arc<dyn ChainReader>,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        let chain = options.validate(api_key)?;
        if identity.telegram_user_id.is_empty() {
            return Err(ClientError::config("telegram user id not provided"));
        }
        let sponsorship = Sponsorship::from_options(&options, &chain, backend.clone())?;
        let submitter = Submitter::new(
            options.bundler_endpoint.as_deref(),
            chain.entry_point,
            backend.clone(),
            chain.chain_id,
        )?;

        if !backend.verify_api_key().await? {
            return Err(ClientError::Authentication("api key invalid".to_string()));
        }

        let account =
            account::derive_address(reader.as_ref(), &chain, identity.wallet_address).await?;
        info!(
            "Delegated client ready on chain {} with smart account {:?}",
            chain.chain_id, account
        );

        Ok(Self {
            receipts: ReceiptResolver::new(backend.clone()),
            pending: PendingRequests::new(options.authorization_ttl()),
            chain,
            identity,
            reader,
            backend,
            sponsorship,
            submitter,
            account,
        })
    }

    pub fn account_address(&self) -> Address {
        self.account
    }

    pub fn identity(&self) -> &DelegatedIdentity {
        &self.identity
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub async fn prepare_send(&self, intent: CallIntent) -> Result<PreparedSend> {
        self.prepare(CallPlan::Single(intent)).await
    }

    pub async fn prepare_send_batch(&self, intents: Vec<CallIntent>) -> Result<PreparedSend> {
        self.prepare(CallPlan::batch(intents)?).await
    }

    /// Exchanges the OTP for a signed operation and submits it.
    pub async fn confirm_send(&self, request_id: &str, otp: &str) -> Result<SendOutcome> {
        self.pending.take(request_id).await?;
        let tg = self.identity.telegram_user_id.as_str();

        let hash = if self.submitter.uses_bundler() {
            let signed = self
                .backend
                .verify_otp(request_id, tg, otp)
                .await
                .map_err(authorization)?;
            self.submitter.submit(&signed).await?
        } else {
            self.backend
                .send_authorized(request_id, tg, otp)
                .await
                .map_err(authorization)?
        };
        info!("Request {} confirmed as {:?}", request_id, hash);
        Ok(self.receipts.outcome(hash, self.chain.chain_id).await)
    }

    pub async fn receipt(&self, hash: ethers::types::H256) -> ReceiptLookup {
        self.receipts.resolve(hash, self.chain.chain_id).await
    }

    /// Deploys the account through the backend on first use.
    async fn ensure_account(&self) -> Result<Deployment> {
        let status = account::deployment(self.reader.as_ref(), self.account).await?;
        if status == Deployment::Undeployed {
            info!("Requesting deployment of delegated account {:?}", self.account);
            self.backend
                .create_account(&AccountCreation::Delegated {
                    telegram_user_id: self.identity.telegram_user_id.clone(),
                    wallet_address: self.identity.wallet_address,
                    chain_id: self.chain.chain_id,
                    calldata: account::initialization_payload(
                        &self.chain,
                        self.identity.wallet_address,
                    ),
                })
                .await?;
        }
        Ok(status)
    }

    async fn build(&self, plan: &CallPlan) -> Result<UserOperation> {
        let status = self.ensure_account().await?;
        let nonce: U256 = account::next_nonce(self.reader.as_ref(), self.account, status).await?;
        let fees = gas::estimate_fees(self.reader.as_ref(), self.chain.priority_fee).await?;
        debug!("Building delegated operation with nonce {}", nonce);

        // The owner key is not held here, so the operation goes out unsigned.
        Ok(OperationBuilder::new(GasPolicy::DELEGATED, Bytes::default()).build(
            self.account,
            nonce,
            Bytes::default(),
            plan.encode(),
            fees,
        ))
    }

    async fn prepare(&self, plan: CallPlan) -> Result<PreparedSend> {
        let op = self.build(&plan).await?;
        let op = self.sponsorship.sponsor(op).await?;

        let tg = self.identity.telegram_user_id.as_str();
        let request_id = self
            .backend
            .log_prepared_operation(self.chain.chain_id, &op, tg)
            .await?;
        self.pending.register(&request_id).await;

        let dispatch = self.backend.send_otp(tg, &request_id).await?;
        info!("OTP sent for request {}", request_id);
        Ok(PreparedSend {
            request_id,
            otp_sent: dispatch.otp_sent,
        })
    }
}

/// Backend statuses that mean the OTP or the request was refused.
const OTP_REJECTIONS: [u16; 5] = [400, 401, 403, 404, 410];

fn authorization(err: ClientError) -> ClientError {
    match err {
        ClientError::Application { status, message } if OTP_REJECTIONS.contains(&status) => {
            warn!("OTP rejected with status {}: {}", status, message);
            ClientError::Authorization(message)
        }
        other => other,
    }
}
