//! Shared test fixtures: an in-memory ledger with a real nonce counter.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use testnet_faucet::coordinator::DisbursementSettings;
use testnet_faucet::{
    parse_ether, Address, DisbursementCoordinator, EligibilityGate, Ledger, LedgerError, Transfer,
    TxHash,
};

pub const WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

pub const FAUCET: Address = Address([0xfa; 20]);

pub fn addr(i: u8) -> Address {
    Address([i; 20])
}

pub fn ether(s: &str) -> u128 {
    parse_ether(s).unwrap()
}

pub struct MockLedger {
    balance: Mutex<u128>,
    fee_rate: u128,
    nonce: Mutex<u64>,
    submit_delay: Mutex<Duration>,
    fail_next: Mutex<Option<LedgerError>>,
    fail_reads: Mutex<Option<LedgerError>>,
    queue_future_nonces: AtomicBool,
    submitted: Mutex<Vec<Transfer>>,
    in_submission: AtomicBool,
    interleaved: AtomicBool,
    reads: AtomicUsize,
}

impl MockLedger {
    pub fn new(balance: u128, fee_rate: u128) -> Arc<Self> {
        Arc::new(Self {
            balance: Mutex::new(balance),
            fee_rate,
            nonce: Mutex::new(0),
            submit_delay: Mutex::new(Duration::ZERO),
            fail_next: Mutex::new(None),
            fail_reads: Mutex::new(None),
            queue_future_nonces: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
            in_submission: AtomicBool::new(false),
            interleaved: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = delay;
    }

    pub fn fail_next_submission(&self, err: LedgerError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Balance and fee reads fail with `err` until cleared with `None`.
    pub fn fail_reads(&self, err: Option<LedgerError>) {
        *self.fail_reads.lock() = err;
    }

    /// Accept transfers whose nonce is ahead of the pending nonce, like a
    /// node that parks them in its queue.
    pub fn queue_future_nonces(&self) {
        self.queue_future_nonces.store(true, Ordering::SeqCst);
    }

    /// Rewind the pending nonce, as when a pending transfer is evicted.
    pub fn set_pending_nonce(&self, nonce: u64) {
        *self.nonce.lock() = nonce;
    }

    pub fn pending_nonce_now(&self) -> u64 {
        *self.nonce.lock()
    }

    pub fn submitted_nonces(&self) -> Vec<u64> {
        self.submitted.lock().iter().map(|t| t.nonce).collect()
    }

    pub fn submitted(&self) -> Vec<Transfer> {
        self.submitted.lock().clone()
    }

    pub fn balance_now(&self) -> u128 {
        *self.balance.lock()
    }

    /// Balance, fee and nonce reads observed so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn saw_interleaving(&self) -> bool {
        self.interleaved.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    fn address(&self) -> Address {
        FAUCET
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(11155111)
    }

    async fn balance(&self) -> Result<u128, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_reads.lock().clone() {
            return Err(err);
        }
        Ok(*self.balance.lock())
    }

    async fn fee_estimate(&self) -> Result<u128, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_reads.lock().clone() {
            return Err(err);
        }
        Ok(self.fee_rate)
    }

    async fn pending_nonce(&self) -> Result<u64, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(*self.nonce.lock())
    }

    async fn submit_transfer(&self, transfer: &Transfer) -> Result<TxHash, LedgerError> {
        if self.in_submission.swap(true, Ordering::SeqCst) {
            self.interleaved.store(true, Ordering::SeqCst);
        }

        let delay = *self.submit_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = self.apply(transfer);
        self.in_submission.store(false, Ordering::SeqCst);
        result
    }
}

impl MockLedger {
    fn apply(&self, transfer: &Transfer) -> Result<TxHash, LedgerError> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }

        let mut nonce = self.nonce.lock();
        let queued = transfer.nonce > *nonce && self.queue_future_nonces.load(Ordering::SeqCst);
        if transfer.nonce != *nonce && !queued {
            return Err(LedgerError::NonceTooLow);
        }

        let cost = transfer.value + transfer.gas_limit as u128 * transfer.gas_price;
        let mut balance = self.balance.lock();
        if *balance < cost {
            return Err(LedgerError::InsufficientFunds);
        }
        *balance -= cost;

        // Queued transfers do not move the pending nonce
        if !queued {
            *nonce += 1;
        }
        let mut submitted = self.submitted.lock();
        submitted.push(transfer.clone());
        Ok(format!("0x{:064x}", submitted.len()))
    }
}

pub fn settings(amount: &str) -> DisbursementSettings {
    DisbursementSettings {
        amount: ether(amount),
        gas_limit: 21000,
        submit_timeout: Duration::from_secs(5),
    }
}

pub fn coordinator(
    ledger: Arc<MockLedger>,
    gate: EligibilityGate,
    settings: DisbursementSettings,
) -> DisbursementCoordinator {
    DisbursementCoordinator::new(ledger, gate, settings).unwrap()
}
