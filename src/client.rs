// src/client.rs
use std::sync::Arc;

use ethers::abi::AbiEncode;
use ethers::prelude::*;
use tracing::{debug, info};

use crate::account::{self, Deployment};
use crate::backend::{AccountCreation, Backend, HttpBackend};
use crate::builder::{CallPlan, OperationBuilder};
use crate::chain::{ChainReader, EthersChain};
use crate::config::{ChainConfig, ClientOptions, OwnerCredential};
use crate::contracts::WithdrawToCall;
use crate::error::{ClientError, Result};
use crate::funds::{EntryPointFunds, WalletClient};
use crate::gas::{self, GasPolicy};
use crate::paymaster::Sponsorship;
use crate::receipt::{ReceiptLookup, ReceiptResolver};
use crate::signer::{OperationSigner, OwnerSigner};
use crate::submit::Submitter;
use crate::types::{CallIntent, SendOutcome, UserOperation};

/// Collaborators a direct-key session runs against.
pub struct Components {
    pub reader: Arc<dyn ChainReader>,
    pub backend: Arc<dyn Backend>,
    pub owner: Arc<dyn OwnerSigner>,
}

/// Session whose owner key signs every operation locally.
///
/// A constructed client is always ready: configuration, API key and account
/// address are resolved by [`DirectClient::init`].
pub struct DirectClient {
    chain: ChainConfig,
    options: ClientOptions,
    reader: Arc<dyn ChainReader>,
    backend: Arc<dyn Backend>,
    signer: OperationSigner,
    sponsorship: Sponsorship,
    submitter: Submitter,
    receipts: ReceiptResolver,
    account: Address,
    funds: Option<EntryPointFunds<WalletClient>>,
}

impl DirectClient {
    pub async fn init(
        api_key: &str,
        options: ClientOptions,
        credential: OwnerCredential,
    ) -> Result<Self> {
        let chain = options.validate(api_key)?;
        let ethers_chain = EthersChain::connect(&options.rpc_url, &chain)?;

        let mut funds = None;
        let owner: Arc<dyn OwnerSigner> = match credential {
            OwnerCredential::PrivateKey(key) => {
                let wallet = key
                    .parse::<LocalWallet>()
                    .map_err(|e| ClientError::config(format!("invalid private key: {e}")))?
                    .with_chain_id(chain.chain_id);
                let client = SignerMiddleware::new(
                    ethers_chain.client().as_ref().clone(),
                    wallet.clone(),
                );
                funds = Some(EntryPointFunds::new(Arc::new(client), chain.entry_point));
                Arc::new(wallet)
            }
            OwnerCredential::Signer(signer) => signer,
        };

        let components = Components {
            reader: Arc::new(ethers_chain),
            backend: Arc::new(HttpBackend::new(options.api_url(), api_key)),
            owner,
        };
        let mut client = Self::with_components(api_key, options, components).await?;
        client.funds = funds;
        Ok(client)
    }

    pub async fn with_components(
        api_key: &str,
        options: ClientOptions,
        components: Components,
    ) -> Result<Self> {
        let chain = options.validate(api_key)?;
        let Components {
            reader,
            backend,
            owner,
        } = components;

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

        let signer = OperationSigner::new(reader.clone(), owner);
        let account = account::derive_address(reader.as_ref(), &chain, signer.owner()).await?;
        info!(
            "Direct client ready on chain {} with smart account {:?}",
            chain.chain_id, account
        );

        Ok(Self {
            receipts: ReceiptResolver::new(backend.clone()),
            chain,
            options,
            reader,
            backend,
            signer,
            sponsorship,
            submitter,
            account,
            funds: None,
        })
    }

    pub fn account_address(&self) -> Address {
        self.account
    }

    pub fn owner_address(&self) -> Address {
        self.signer.owner()
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub async fn send(&self, intent: CallIntent) -> Result<SendOutcome> {
        self.execute(CallPlan::Single(intent), GasPolicy::DIRECT_SINGLE)
            .await
    }

    pub async fn send_batch(&self, intents: Vec<CallIntent>) -> Result<SendOutcome> {
        let plan = CallPlan::batch(intents)?;
        self.execute(plan, GasPolicy::DIRECT_BATCH).await
    }

    pub async fn receipt(&self, hash: H256) -> ReceiptLookup {
        self.receipts.resolve(hash, self.chain.chain_id).await
    }

    /// Tops up the account's entry-point deposit from the owner EOA.
    pub async fn add_funds(&self, value: U256) -> Result<TxHash> {
        let funds = self.funds.as_ref().ok_or_else(|| {
            ClientError::config("adding funds requires a private key credential")
        })?;
        funds.deposit(self.account, value).await
    }

    /// `withdrawTo(to, value)` on the entry point, called by the account itself.
    pub async fn withdraw_funds(&self, to: Address, value: U256) -> Result<SendOutcome> {
        let call = WithdrawToCall {
            withdraw_address: to,
            withdraw_amount: value,
        };
        self.send(CallIntent::new(self.chain.entry_point, call.encode()))
            .await
    }

    pub async fn deposit_balance(&self) -> Result<U256> {
        let funds = self.funds.as_ref().ok_or_else(|| {
            ClientError::config("deposit balance requires a private key credential")
        })?;
        funds.balance(self.account).await
    }

    /// Resolves nonce and init-code from a single deployment check so both agree.
    async fn account_state(&self) -> Result<(U256, Bytes)> {
        let status = account::deployment(self.reader.as_ref(), self.account).await?;
        let init_code = match status {
            Deployment::Deployed => Bytes::default(),
            Deployment::Undeployed if self.options.no_account_create_sponsorship => {
                debug!("Account {:?} undeployed, attaching init code", self.account);
                account::init_code(&self.chain, self.signer.owner())
            }
            Deployment::Undeployed => {
                info!("Requesting sponsored deployment of {:?}", self.account);
                self.backend
                    .create_account(&AccountCreation::Owner {
                        eoa: self.signer.owner(),
                        chain_id: self.chain.chain_id,
                    })
                    .await?;
                Bytes::default()
            }
        };
        let nonce = account::next_nonce(self.reader.as_ref(), self.account, status).await?;
        Ok((nonce, init_code))
    }

    async fn build(&self, plan: &CallPlan, policy: GasPolicy) -> Result<UserOperation> {
        let (nonce, init_code) = self.account_state().await?;
        let fees = gas::estimate_fees(self.reader.as_ref(), self.chain.priority_fee).await?;
        let dummy_signature = self.signer.dummy_signature().await?;
        debug!("Building operation for {:?} with nonce {}", self.account, nonce);

        Ok(OperationBuilder::new(policy, dummy_signature).build(
            self.account,
            nonce,
            init_code,
            plan.encode(),
            fees,
        ))
    }

    async fn execute(&self, plan: CallPlan, policy: GasPolicy) -> Result<SendOutcome> {
        let op = self.build(&plan, policy).await?;
        let op = self.sponsorship.sponsor(op).await?;
        let op = self.signer.sign(op).await?;
        let hash = self.submitter.submit(&op).await?;
        Ok(self.receipts.outcome(hash, self.chain.chain_id).await)
    }
}
