//! Testnet faucet service
//!
//! Dispenses a fixed amount of testnet ether from a single hot wallet:
//! - Per-address cooldown (eligibility gate)
//! - Affordability check against live balance and gas price
//! - Serialized, nonce-ordered submission from the shared account
//! - HTTP API, metrics and structured logging

pub mod address;
pub mod amount;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod rpc;

pub use address::{Address, AddressError};
pub use amount::{format_ether, parse_ether, AmountError};
pub use config::FaucetConfig;
pub use coordinator::{Disbursement, DisbursementCoordinator, FaucetStatus};
pub use error::{FaucetError, FaucetResult, SubmissionFailure};
pub use gate::{Clock, EligibilityGate, Reservation, SystemClock};
pub use ledger::{Ledger, LedgerError, Transfer, TxHash};
pub use metrics::FaucetMetrics;
pub use rpc::JsonRpcLedger;
