//! Transaction submission: sign, send with bounded retries, confirm.
//!
//! Two signing strategies are supported, chosen from the wallet's
//! capabilities:
//!
//! 1. sign-then-send-raw (preferred): the wallet returns the signed
//!    transaction, which we send ourselves and may retry
//! 2. sign-and-send: the wallet submits on its own; a single attempt
//!
//! A wallet with neither fails with `WalletIncapable` before any network
//! call, unless the connection runs in [`Mode::Simulated`], where a
//! placeholder signature is returned instead.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{CoreConfig, Mode};
use crate::error::{DealError, Result};
use crate::keys::Signature;
use crate::ledger::Ledger;
use crate::network::Connection;
use crate::outcome::OperationResult;
use crate::transaction::Transaction;
use crate::wallet::{self, WalletCapabilities, WalletHandle};

/// Upper bound on the delay between send attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bounds for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Extra send attempts after a transient failure.
    pub max_retries: u32,
    /// How long to wait for confirmation.
    pub confirm_timeout: Duration,
    /// Delay between status polls; also the base retry delay.
    pub poll_interval: Duration,
}

impl SubmitOptions {
    /// Options taken from the core configuration.
    #[must_use]
    pub const fn from_config(config: &CoreConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.poll_interval.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

/// Sign `tx` with `wallet`, send it, and wait for confirmation.
///
/// `tx` may already carry signatures from local signers; the wallet adds
/// the payer's.
pub async fn submit<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    tx: Transaction,
    options: &SubmitOptions,
) -> OperationResult<Signature> {
    let result = match wallet::capabilities(wallet) {
        Ok(caps) => submit_transaction(connection, wallet, &caps, tx, options).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(signature) => OperationResult::ok_with_ref(signature, connection.explorer_url(&signature)),
        Err(e) => OperationResult::failed(&e),
    }
}

/// Fail early when no signing strategy exists and placeholders are not
/// allowed.
pub(crate) fn require_signer<L: Ledger>(
    connection: &Connection<L>,
    caps: &WalletCapabilities,
) -> Result<()> {
    if caps.can_sign() || connection.mode() == Mode::Simulated {
        return Ok(());
    }
    Err(DealError::wallet_incapable(
        "wallet exposes neither sign-transaction nor sign-and-send",
    ))
}

pub(crate) async fn submit_transaction<L: Ledger, W: WalletHandle>(
    connection: &Connection<L>,
    wallet: &W,
    caps: &WalletCapabilities,
    tx: Transaction,
    options: &SubmitOptions,
) -> Result<Signature> {
    require_signer(connection, caps)?;

    let signature = if caps.can_sign_transaction {
        let signed = wallet.sign_transaction(tx).await?;
        let missing = signed.missing_signers();
        if !missing.is_empty() {
            return Err(DealError::signing_rejected(format!(
                "wallet returned a transaction without signatures for {}",
                missing
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        send_with_retries(connection.ledger(), &signed, options).await?
    } else if caps.can_sign_and_send {
        wallet.sign_and_send(connection.ledger(), tx).await?
    } else {
        let placeholder = Signature::placeholder();
        warn!(signature = %placeholder, "simulated mode: wallet cannot sign, returning placeholder signature");
        return Ok(placeholder);
    };

    await_confirmation(connection.ledger(), &signature, options).await?;
    info!(signature = %signature, "transaction confirmed");
    Ok(signature)
}

async fn send_with_retries<L: Ledger>(
    ledger: &L,
    signed: &Transaction,
    options: &SubmitOptions,
) -> Result<Signature> {
    let wire = signed.serialize();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match ledger.send_raw_transaction(&wire).await {
            Ok(signature) => {
                debug!(signature = %signature, attempt, "transaction sent");
                return Ok(signature);
            }
            Err(e) if e.is_transient() && attempt <= options.max_retries => {
                let delay = options.retry_delay(attempt);
                warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "send failed, retrying");
                sleep(delay).await;
            }
            Err(e) => {
                // An earlier attempt may have landed before its response was lost.
                if attempt > 1 {
                    if let Some(signature) = signed.signature() {
                        if let Ok(Some(_)) = ledger.get_signature_status(&signature).await {
                            debug!(signature = %signature, "earlier attempt landed");
                            return Ok(signature);
                        }
                    }
                }
                warn!(error = %e, attempt, "send failed");
                return Err(if e.is_transient() {
                    DealError::submission_failed(format!("gave up after {attempt} attempts: {e}"))
                } else {
                    e
                });
            }
        }
    }
}

pub(crate) async fn await_confirmation<L: Ledger>(
    ledger: &L,
    signature: &Signature,
    options: &SubmitOptions,
) -> Result<()> {
    let poll = async {
        loop {
            match ledger.get_signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = status.err {
                        return Err(DealError::submission_failed(format!(
                            "transaction {signature} failed on-ledger: {err}"
                        )));
                    }
                    if status.is_confirmed() {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    debug!(error = %e, "status poll failed");
                }
                Err(e) => return Err(e),
            }
            sleep(options.poll_interval).await;
        }
    };

    timeout(options.confirm_timeout, poll).await.map_err(|_| {
        warn!(signature = %signature, "confirmation timed out");
        DealError::ConfirmationTimeout {
            signature: *signature,
            timeout_secs: options.confirm_timeout.as_secs(),
            mint: None,
        }
    })?
}
