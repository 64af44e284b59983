//! Disbursement coordinator
//!
//! Admission and disbursement core. A request moves through
//! `Received → Validated → EligibilityChecked → AffordabilityChecked →
//! Submitted → {Accepted, Rejected}`; only `Accepted` commits the address's
//! cooldown.
//!
//! Everything up to the affordability check runs concurrently. Submission is
//! serialized per source account: the nonce is a single counter and must
//! advance exactly once per accepted transfer, in order.
//!
//! Once an address has been reserved the rest of the pipeline runs on its own
//! task, so a caller that goes away does not cancel a submission that is
//! already in progress.

use crate::address::Address;
use crate::amount::format_ether;
use crate::config::FaucetConfig;
use crate::error::{FaucetError, FaucetResult, SubmissionFailure};
use crate::gate::{EligibilityGate, Reservation};
use crate::ledger::{network_name, Ledger, Transfer, TxHash};
use crate::metrics::FaucetMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Per-disbursement parameters
#[derive(Debug, Clone)]
pub struct DisbursementSettings {
    /// Amount sent per grant, in wei
    pub amount: u128,
    /// Gas limit of a plain transfer
    pub gas_limit: u64,
    /// Upper bound on the serialized submission step
    pub submit_timeout: Duration,
}

impl DisbursementSettings {
    pub fn from_config(config: &FaucetConfig) -> FaucetResult<Self> {
        Ok(Self {
            amount: config.dispense_amount_wei()?,
            gas_limit: config.gas_limit,
            submit_timeout: config.submit_timeout(),
        })
    }
}

/// Accepted disbursement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disbursement {
    pub tx_hash: TxHash,
    /// Amount sent, in ether
    pub amount: String,
    pub recipient: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub name: String,
    pub chain_id: String,
}

/// Faucet status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetStatus {
    pub faucet_address: String,
    pub faucet_balance: String,
    pub faucet_amount: String,
    pub network: NetworkInfo,
}

/// Submission-path state of the source account
#[derive(Debug, Default)]
struct SubmissionLane {
    /// Nonce expected after the last accepted transfer. The network's pending
    /// nonce is always the one submitted; this only flags divergence.
    next_nonce: Option<u64>,
}

struct CoordinatorInner {
    ledger: Arc<dyn Ledger>,
    gate: EligibilityGate,
    settings: DisbursementSettings,
    amount_display: String,
    lane: Mutex<SubmissionLane>,
    metrics: FaucetMetrics,
}

/// Admission and disbursement core
#[derive(Clone)]
pub struct DisbursementCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl DisbursementCoordinator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gate: EligibilityGate,
        settings: DisbursementSettings,
    ) -> FaucetResult<Self> {
        let metrics =
            FaucetMetrics::new().map_err(|e| FaucetError::Unexpected(format!("metrics: {}", e)))?;
        let amount_display = format_ether(settings.amount);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                ledger,
                gate,
                settings,
                amount_display,
                lane: Mutex::new(SubmissionLane::default()),
                metrics,
            }),
        })
    }

    pub fn gate(&self) -> &EligibilityGate {
        &self.inner.gate
    }

    pub fn metrics(&self) -> &FaucetMetrics {
        &self.inner.metrics
    }

    /// Amount sent per grant, in ether
    pub fn amount_display(&self) -> &str {
        &self.inner.amount_display
    }

    /// Entry point for raw, caller-supplied address strings.
    pub async fn request_disbursement(&self, raw: &str) -> FaucetResult<Disbursement> {
        match parse_recipient(raw) {
            Ok(recipient) => self.disburse(recipient).await,
            Err(e) => {
                self.inner.record(&e);
                Err(e)
            }
        }
    }

    /// Disburse to an already parsed address.
    pub async fn disburse(&self, recipient: Address) -> FaucetResult<Disbursement> {
        let reservation = match self.admit(recipient) {
            Ok(reservation) => reservation,
            Err(e) => {
                self.inner.record(&e);
                return Err(e);
            }
        };

        // The outcome is recorded on the task, not by the caller
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = inner.run(recipient, reservation).await;
            match &result {
                Ok(_) => inner.metrics.record_outcome("success"),
                Err(e) => inner.record(e),
            }
            result
        })
        .await
        .map_err(|e| {
            let err = FaucetError::Unexpected(format!("disbursement task failed: {}", e));
            self.inner.record(&err);
            err
        })?
    }

    fn admit(&self, recipient: Address) -> FaucetResult<Reservation> {
        if recipient.is_zero() {
            return Err(FaucetError::InvalidAddress("zero address not allowed".to_string()));
        }
        if recipient == self.inner.ledger.address() {
            return Err(FaucetError::InvalidAddress(
                "cannot send to faucet address".to_string(),
            ));
        }

        let reservation = self.inner.gate.reserve(&recipient)?;
        debug!("Reserved {} for disbursement", recipient);
        Ok(reservation)
    }

    /// Faucet address, balance, amount and network
    pub async fn status(&self) -> FaucetResult<FaucetStatus> {
        let ledger = &self.inner.ledger;
        let (balance, chain_id) = tokio::try_join!(ledger.balance(), ledger.chain_id())?;

        Ok(FaucetStatus {
            faucet_address: ledger.address().to_checksum(),
            faucet_balance: format_ether(balance),
            faucet_amount: self.inner.amount_display.clone(),
            network: NetworkInfo {
                name: network_name(chain_id).to_string(),
                chain_id: chain_id.to_string(),
            },
        })
    }
}

impl CoordinatorInner {
    fn record(&self, err: &FaucetError) {
        self.metrics.record_outcome(err.code());
    }

    async fn run(&self, recipient: Address, reservation: Reservation) -> FaucetResult<Disbursement> {
        let fee_rate = self.check_affordability().await?;

        info!("Sending {} ETH to {}", self.amount_display, recipient);
        let tx_hash = self.submit(recipient, fee_rate).await?;

        reservation.commit();
        info!("Transaction sent: {} ({} ETH to {})", tx_hash, self.amount_display, recipient);

        Ok(Disbursement {
            tx_hash,
            amount: self.amount_display.clone(),
            recipient,
        })
    }

    /// Fresh balance and fee reads; returns the fee rate to submit with.
    async fn check_affordability(&self) -> FaucetResult<u128> {
        let (balance, fee_rate) =
            tokio::try_join!(self.ledger.balance(), self.ledger.fee_estimate())?;
        self.metrics
            .faucet_balance
            .set(format_ether(balance).parse().unwrap_or(0.0));

        let required = (self.settings.gas_limit as u128)
            .checked_mul(fee_rate)
            .and_then(|fee| fee.checked_add(self.settings.amount));

        match required {
            Some(required) if balance >= required => {
                debug!("Balance {} wei covers {} wei", balance, required);
                Ok(fee_rate)
            }
            _ => {
                warn!(
                    "Faucet balance too low: {} wei, need {} wei + {} gas at {} wei",
                    balance, self.settings.amount, self.settings.gas_limit, fee_rate
                );
                Err(FaucetError::InsufficientFunds)
            }
        }
    }

    /// Serialized submission from the source account.
    async fn submit(&self, recipient: Address, fee_rate: u128) -> FaucetResult<TxHash> {
        let mut lane = self.lane.lock().await;
        let tracked = lane.next_nonce;
        let timer = self.metrics.submission_duration.start_timer();

        let attempt = tokio::time::timeout(self.settings.submit_timeout, async {
            let nonce = self.ledger.pending_nonce().await?;
            match tracked {
                Some(expected) if expected > nonce => warn!(
                    "Pending nonce fell back from {} to {}, earlier transfer dropped",
                    expected, nonce
                ),
                Some(expected) if expected < nonce => debug!(
                    "Pending nonce {} ahead of tracked {}, account used elsewhere",
                    nonce, expected
                ),
                _ => {}
            }
            let transfer = Transfer {
                to: recipient,
                value: self.settings.amount,
                gas_limit: self.settings.gas_limit,
                gas_price: fee_rate,
                nonce,
            };
            self.ledger
                .submit_transfer(&transfer)
                .await
                .map(|hash| (hash, nonce))
        })
        .await;
        timer.observe_duration();

        match attempt {
            Ok(Ok((hash, nonce))) => {
                lane.next_nonce = Some(nonce + 1);
                Ok(hash)
            }
            Ok(Err(e)) => {
                lane.next_nonce = None;
                let err = FaucetError::from(e.clone());
                if matches!(err, FaucetError::Unexpected(_)) {
                    error!("Submission to {} failed: {}", recipient, e);
                } else {
                    warn!("Submission to {} failed: {}", recipient, e);
                }
                Err(err)
            }
            Err(_) => {
                lane.next_nonce = None;
                warn!(
                    "Submission to {} timed out after {:?}",
                    recipient, self.settings.submit_timeout
                );
                Err(FaucetError::SubmissionFailed(SubmissionFailure::NetworkFault))
            }
        }
    }
}

fn parse_recipient(raw: &str) -> FaucetResult<Address> {
    if raw.trim().is_empty() {
        return Err(FaucetError::MissingAddress);
    }
    Address::parse(raw).map_err(|e| FaucetError::InvalidAddress(e.to_string()))
}
