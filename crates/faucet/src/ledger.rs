//! Ledger abstraction
//!
//! The coordinator talks to the network through this trait. Implementations
//! classify their failures into [`LedgerError`] at this boundary so callers
//! never inspect raw RPC messages.

use crate::address::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque transaction reference returned on acceptance
pub type TxHash = String;

/// Network collaborator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient funds for transfer")]
    InsufficientFunds,

    #[error("nonce too low")]
    NonceTooLow,

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A value transfer from the ledger's account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: Address,
    pub value: u128,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub nonce: u64,
}

/// Account and submission capability of the hot wallet
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address of the sending account.
    fn address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Current balance in wei.
    async fn balance(&self) -> Result<u128, LedgerError>;

    /// Current gas price estimate in wei.
    async fn fee_estimate(&self) -> Result<u128, LedgerError>;

    /// Next nonce according to the network, counting pending transactions.
    async fn pending_nonce(&self) -> Result<u64, LedgerError>;

    /// Hand a transfer to the network. Returns once it has been accepted,
    /// not confirmed.
    async fn submit_transfer(&self, transfer: &Transfer) -> Result<TxHash, LedgerError>;
}

/// Human-readable network name for well-known chain ids.
pub fn network_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "mainnet",
        5 => "goerli",
        17000 => "holesky",
        11155111 => "sepolia",
        31337 => "anvil",
        _ => "unknown",
    }
}
