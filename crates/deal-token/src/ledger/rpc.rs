//! JSON-RPC 2.0 client for a ledger node.

use super::{AccountInfo, ConfirmationStatus, Ledger, SignatureStatus};
use crate::amount::Amount;
use crate::error::{DealError, Result};
use crate::keys::{Address, Blockhash, Signature};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Commitment used for every read and for preflight.
const COMMITMENT: &str = "confirmed";

/// Per-request HTTP timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Results wrapped as `{ context, value }`.
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    lamports: u64,
    owner: String,
    data: (String, String),
    executable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusValue {
    slot: u64,
    confirmation_status: Option<ConfirmationStatus>,
    err: Option<Value>,
}

/// Ledger reached over HTTP JSON-RPC.
pub struct RpcLedger {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcLedger {
    /// Create a client for the node at `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DealError::network_error(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// The node URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.url, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DealError::network_error(format!("{method}: {e}")))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DealError::network_error(format!("{method}: HTTP {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DealError::network_error(format!("{method}: {e}")))?;
        if !status.is_success() {
            return Err(DealError::Rpc {
                code: i64::from(status.as_u16()),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: RpcResponse<T> = serde_json::from_slice(&bytes)?;
        if let Some(err) = parsed.error {
            return Err(DealError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| DealError::network_error(format!("{method}: response has no result")))
    }
}

impl Ledger for RpcLedger {
    async fn get_balance(&self, address: &Address) -> Result<Amount> {
        let res: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": COMMITMENT }]),
            )
            .await?;
        Ok(Amount::from_lamports(res.value))
    }

    async fn get_latest_blockhash(&self) -> Result<Blockhash> {
        let res: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))
            .await?;
        Blockhash::from_base58(&res.value.blockhash)
    }

    async fn get_account_info(&self, address: &Address) -> Result<Option<AccountInfo>> {
        let res: WithContext<Option<AccountValue>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": COMMITMENT }
                ]),
            )
            .await?;
        res.value
            .map(|account| -> Result<AccountInfo> {
                let data = BASE64
                    .decode(account.data.0.as_bytes())
                    .map_err(|e| DealError::network_error(format!("bad account data: {e}")))?;
                Ok(AccountInfo {
                    lamports: account.lamports,
                    owner: Address::from_base58(&account.owner)?,
                    data,
                    executable: account.executable,
                })
            })
            .transpose()
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> Result<u64> {
        self.call("getMinimumBalanceForRentExemption", json!([data_len]))
            .await
    }

    async fn send_raw_transaction(&self, wire: &[u8]) -> Result<Signature> {
        let encoded = BASE64.encode(wire);
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    { "encoding": "base64", "preflightCommitment": COMMITMENT }
                ]),
            )
            .await?;
        Signature::from_base58(&signature)
    }

    async fn get_signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>> {
        let res: WithContext<Vec<Option<StatusValue>>> = self
            .call("getSignatureStatuses", json!([[signature.to_string()]]))
            .await?;
        Ok(res.value.into_iter().next().flatten().map(|s| SignatureStatus {
            slot: s.slot,
            confirmation_status: s.confirmation_status,
            err: s.err.map(|e| e.to_string()),
        }))
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
