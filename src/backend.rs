// src/backend.rs
//! Client for the first-party backend REST API.
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error};

use crate::error::{ClientError, Result};
use crate::types::{UserOpReceipt, UserOperation};

const API_KEY_HEADER: &str = "x-api-key";

/// Sponsored account deployment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCreation {
    /// Account owned directly by an EOA.
    Owner { eoa: Address, chain_id: u64 },
    /// Account owned by a wallet held behind the OTP authorization.
    Delegated {
        telegram_user_id: String,
        wallet_address: Address,
        chain_id: u64,
        calldata: Bytes,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreated {
    #[serde(default)]
    pub smart_account_address: Option<Address>,
    #[serde(default)]
    pub receipt: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpDispatch {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub otp_sent: Option<serde_json::Value>,
}

/// REST surface of the backend used by both clients.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn verify_api_key(&self) -> Result<bool>;

    /// Returns the operation with sponsorship fields filled.
    async fn paymaster_data(&self, chain_id: u64, op: &UserOperation) -> Result<UserOperation>;

    async fn send_to_bundler(&self, chain_id: u64, op: &UserOperation) -> Result<H256>;

    /// `Ok(None)` when no receipt is indexed yet.
    async fn transaction_receipt(&self, chain_id: u64, hash: H256) -> Result<Option<UserOpReceipt>>;

    async fn create_account(&self, request: &AccountCreation) -> Result<AccountCreated>;

    /// Stores a prepared operation and returns its correlation id.
    async fn log_prepared_operation(
        &self,
        chain_id: u64,
        op: &UserOperation,
        telegram_user_id: &str,
    ) -> Result<String>;

    async fn send_otp(&self, telegram_user_id: &str, request_id: &str) -> Result<OtpDispatch>;

    async fn verify_otp(
        &self,
        request_id: &str,
        telegram_user_id: &str,
        otp: &str,
    ) -> Result<UserOperation>;

    async fn send_authorized(
        &self,
        request_id: &str,
        telegram_user_id: &str,
        otp: &str,
    ) -> Result<H256>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidityBody {
    #[serde(default)]
    valid: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashBody {
    user_operation_hash: H256,
}

#[derive(Debug, Deserialize)]
struct ReceiptBody {
    #[serde(default)]
    receipt: Option<UserOpReceipt>,
}

#[derive(Debug, Deserialize)]
struct PreparedBody {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedOpBody {
    signed_op: UserOperation,
}

pub struct HttpBackend {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RequestBuilder {
        self.http
            .post(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Turns a status >= 400 into an application error carrying the body's `message`.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or(text);
    error!("Backend returned {}: {}", status, message);
    Err(ClientError::Application {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn verify_api_key(&self) -> Result<bool> {
        match self.send::<ValidityBody>(self.get("/api-key/verify")).await {
            Ok(body) => Ok(body.valid),
            Err(ClientError::Application {
                status: 401 | 403,
                message,
            }) => Err(ClientError::Authentication(message)),
            Err(e) => Err(e),
        }
    }

    async fn paymaster_data(&self, chain_id: u64, op: &UserOperation) -> Result<UserOperation> {
        let body = json!({ "chainId": chain_id, "userOperation": op });
        self.send(self.post("/transaction/userop-pm-data", &body))
            .await
    }

    async fn send_to_bundler(&self, chain_id: u64, op: &UserOperation) -> Result<H256> {
        let body = json!({ "chainId": chain_id, "userOperation": op });
        let body: HashBody = self.send(self.post("/transaction/send", &body)).await?;
        Ok(body.user_operation_hash)
    }

    async fn transaction_receipt(&self, chain_id: u64, hash: H256) -> Result<Option<UserOpReceipt>> {
        let path = format!("/transaction/receipt/{chain_id}/{hash:?}");
        debug!("Looking up receipt at {}", path);
        let response = self.get(&path).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ReceiptBody = check_status(response).await?.json().await?;
        Ok(body.receipt)
    }

    async fn create_account(&self, request: &AccountCreation) -> Result<AccountCreated> {
        match request {
            AccountCreation::Owner { eoa, chain_id } => {
                let body = json!({ "eoa": eoa, "chainId": chain_id });
                self.send(self.post("/transaction/create-0xsmart-account", &body))
                    .await
            }
            AccountCreation::Delegated {
                telegram_user_id,
                wallet_address,
                chain_id,
                calldata,
            } => {
                let body = json!({
                    "telegramUserId": telegram_user_id,
                    "walletAddress": wallet_address,
                    "chainId": chain_id,
                    "calldata": calldata,
                });
                self.send(self.post("/telegram-auth/trx/create-smart-account", &body))
                    .await
            }
        }
    }

    async fn log_prepared_operation(
        &self,
        chain_id: u64,
        op: &UserOperation,
        telegram_user_id: &str,
    ) -> Result<String> {
        let body = json!({
            "userOp": op,
            "chainId": chain_id,
            "telegramUserId": telegram_user_id,
        });
        let body: PreparedBody = self
            .send(self.post("/telegram-auth/trx/log-prepareop-req", &body))
            .await?;
        Ok(body.id)
    }

    async fn send_otp(&self, telegram_user_id: &str, request_id: &str) -> Result<OtpDispatch> {
        let path = format!("/telegram-auth/trx-otp/{telegram_user_id}/{request_id}");
        self.send(self.get(&path)).await
    }

    async fn verify_otp(
        &self,
        request_id: &str,
        telegram_user_id: &str,
        otp: &str,
    ) -> Result<UserOperation> {
        let body = otp_body(request_id, telegram_user_id, otp);
        let body: SignedOpBody = self
            .send(self.post("/telegram-auth/trx-otp/verify", &body))
            .await?;
        Ok(body.signed_op)
    }

    async fn send_authorized(
        &self,
        request_id: &str,
        telegram_user_id: &str,
        otp: &str,
    ) -> Result<H256> {
        let body = otp_body(request_id, telegram_user_id, otp);
        let body: HashBody = self
            .send(self.post("/telegram-auth/trx/send", &body))
            .await?;
        Ok(body.user_operation_hash)
    }
}

fn otp_body(request_id: &str, telegram_user_id: &str, otp: &str) -> serde_json::Value {
    json!({
        "requestId": request_id,
        "telegramUserId": telegram_user_id,
        "otp": otp,
    })
}
