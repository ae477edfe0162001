//! HTTP facilitator gateway implementation

use crate::{
    constants::{
        FACILITATOR_BALANCE_ENDPOINT, FACILITATOR_SETTLE_ENDPOINT, REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::PaymentError,
    gateway::{PaymentGateway, Settlement, TransferAuthorization},
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

/// Facilitator response for balance queries
#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u64,
}

/// Transfer as posted to the facilitator
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettleRequest {
    token: String,
    from: String,
    to: String,
    amount: u64,
    valid_after: i64,
    valid_before: i64,
    nonce: String,
    signature: String,
}

impl From<&TransferAuthorization> for SettleRequest {
    fn from(transfer: &TransferAuthorization) -> Self {
        Self {
            token: transfer.token.to_string(),
            from: transfer.from.to_string(),
            to: transfer.to.to_string(),
            amount: transfer.amount,
            valid_after: transfer.valid_after,
            valid_before: transfer.valid_before,
            nonce: transfer
                .nonce
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect(),
            signature: transfer.signature.to_string(),
        }
    }
}

/// Facilitator response for settlements
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponse {
    success: bool,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    settled_at: Option<i64>,
    /// Payer balance reported with `insufficient_funds`
    #[serde(default)]
    available: Option<u64>,
}

/// Gateway that forwards settlements to a remote facilitator
///
/// The facilitator holds the token balances and performs signature, window
/// and nonce checks; this client maps its answers onto `PaymentError`.
pub struct FacilitatorGateway {
    client: Client,
    base_url: String,
    token: Pubkey,
}

impl FacilitatorGateway {
    /// Creates a new facilitator gateway
    pub fn new(base_url: impl Into<String>, token: Pubkey) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn balance_url(&self, owner: &Pubkey) -> String {
        format!(
            "{}{}/{}?token={}",
            self.base_url, FACILITATOR_BALANCE_ENDPOINT, owner, self.token
        )
    }

    fn settle_url(&self) -> String {
        format!("{}{}", self.base_url, FACILITATOR_SETTLE_ENDPOINT)
    }

    /// Maps a facilitator settle response onto a settlement or error
    fn parse_settle_response(
        response: SettleResponse,
        transfer: &TransferAuthorization,
    ) -> Result<Settlement, PaymentError> {
        if response.success {
            return Ok(Settlement {
                from: transfer.from,
                to: transfer.to,
                amount: transfer.amount,
                settled_at: response.settled_at.unwrap_or_else(|| Utc::now().timestamp()),
            });
        }

        let message = response.message.unwrap_or_default();
        let err = match response.error_code.as_deref() {
            Some("invalid_signature") => PaymentError::InvalidSignature,
            Some("nonce_used") => PaymentError::NonceAlreadyUsed,
            Some("authorization_not_yet_valid") => PaymentError::AuthorizationNotYetValid {
                valid_after: transfer.valid_after,
                now: Utc::now().timestamp(),
            },
            Some("authorization_expired") => PaymentError::AuthorizationExpired {
                valid_before: transfer.valid_before,
                now: Utc::now().timestamp(),
            },
            Some("insufficient_funds") => match response.available {
                Some(available) => PaymentError::InsufficientFunds {
                    required: transfer.amount,
                    available,
                },
                None => PaymentError::Rejected(format!("insufficient_funds: {}", message)),
            },
            Some(code) => PaymentError::Rejected(format!("{}: {}", code, message)),
            None => PaymentError::Rejected(message),
        };
        Err(err)
    }

    async fn check_status(response: reqwest::Response) -> Result<String, PaymentError> {
        if response.status().as_u16() == 429 {
            return Err(PaymentError::RateLimited);
        }

        let status = response.status();
        let body = response.text().await?;
        // Settlement failures come back as 4xx with a JSON body
        if status.is_server_error() {
            return Err(PaymentError::Network(format!("HTTP {}: {}", status, body)));
        }
        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for FacilitatorGateway {
    async fn balance_of(&self, owner: &Pubkey) -> Result<u64, PaymentError> {
        let url = self.balance_url(owner);
        tracing::debug!(url = %url, "Querying facilitator balance");

        let response = self.client.get(&url).send().await?;
        let body = Self::check_status(response).await?;

        let parsed: BalanceResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::InvalidResponse(format!(
                "Failed to parse balance response: {}. Response: {}",
                e, body
            ))
        })?;
        Ok(parsed.balance)
    }

    async fn settle_with_authorization(
        &self,
        transfer: &TransferAuthorization,
    ) -> Result<Settlement, PaymentError> {
        let request = SettleRequest::from(transfer);
        let response = self
            .client
            .post(self.settle_url())
            .json(&request)
            .send()
            .await?;
        let body = Self::check_status(response).await?;

        let parsed: SettleResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::InvalidResponse(format!(
                "Failed to parse settle response: {}. Response: {}",
                e, body
            ))
        })?;

        let result = Self::parse_settle_response(parsed, transfer);
        if let Err(e) = &result {
            tracing::warn!(from = %transfer.from, error = %e, "Facilitator rejected settlement");
        }
        result
    }

    fn token(&self) -> Pubkey {
        self.token
    }

    fn gateway_name(&self) -> &'static str {
        "facilitator"
    }
}
