//! Error types for the faucet service

use crate::ledger::LedgerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Why an accepted-eligible request failed at the network
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFailure {
    #[error("insufficient funds at submission")]
    InsufficientFundsAtSubmit,

    #[error("network fault")]
    NetworkFault,
}

/// Faucet service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaucetError {
    #[error("Address is required")]
    MissingAddress,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Rate limit exceeded: try again in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Insufficient funds in faucet")]
    InsufficientFunds,

    #[error("Submission failed: {0}")]
    SubmissionFailed(SubmissionFailure),

    #[error("Internal error: {0}")]
    Unexpected(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FaucetError {
    pub fn rate_limited(remaining: Duration) -> Self {
        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        FaucetError::RateLimited {
            retry_after_secs: secs,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            FaucetError::MissingAddress => "MISSING_ADDRESS",
            FaucetError::InvalidAddress(_) => "INVALID_ADDRESS",
            FaucetError::RateLimited { .. } => "RATE_LIMITED",
            FaucetError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FaucetError::SubmissionFailed(SubmissionFailure::InsufficientFundsAtSubmit) => {
                "INSUFFICIENT_FUNDS_AT_SUBMIT"
            }
            FaucetError::SubmissionFailed(SubmissionFailure::NetworkFault) => "NETWORK_FAULT",
            FaucetError::Unexpected(_) => "UNEXPECTED",
            FaucetError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Retrying the same request may succeed; eligibility was not consumed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FaucetError::SubmissionFailed(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            FaucetError::MissingAddress | FaucetError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::InsufficientFunds | FaucetError::SubmissionFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            FaucetError::Unexpected(_) | FaucetError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            FaucetError::MissingAddress => "Address is required".to_string(),
            FaucetError::InvalidAddress(_) => "Invalid Ethereum address format".to_string(),
            FaucetError::RateLimited { retry_after_secs } => format!(
                "Rate limit exceeded. Please try again in {}.",
                humanize_secs(*retry_after_secs)
            ),
            FaucetError::InsufficientFunds => "Insufficient faucet balance".to_string(),
            FaucetError::SubmissionFailed(SubmissionFailure::InsufficientFundsAtSubmit) => {
                "Insufficient funds in faucet wallet".to_string()
            }
            FaucetError::SubmissionFailed(SubmissionFailure::NetworkFault) => {
                "Network error. Please try again later.".to_string()
            }
            FaucetError::Unexpected(_) | FaucetError::Config(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

fn humanize_secs(secs: u64) -> String {
    match secs {
        s if s >= 3600 => {
            let hours = (s + 3599) / 3600;
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        }
        s if s >= 60 => {
            let minutes = (s + 59) / 60;
            format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
        }
        s => format!("{} second{}", s, if s == 1 { "" } else { "s" }),
    }
}

impl From<LedgerError> for FaucetError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds => {
                FaucetError::SubmissionFailed(SubmissionFailure::InsufficientFundsAtSubmit)
            }
            LedgerError::Network(_) | LedgerError::Timeout | LedgerError::NonceTooLow => {
                FaucetError::SubmissionFailed(SubmissionFailure::NetworkFault)
            }
            LedgerError::Rejected(msg) => FaucetError::Unexpected(format!("rejected: {}", msg)),
            LedgerError::Malformed(msg) => FaucetError::Unexpected(format!("malformed: {}", msg)),
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        if let FaucetError::Unexpected(detail) | FaucetError::Config(detail) = &self {
            error!("Unhandled faucet error: {}", detail);
        }

        let mut response = (
            self.status_code(),
            Json(json!({
                "success": false,
                "error": self.public_message(),
                "errorCode": self.code(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
        )
            .into_response();

        if let FaucetError::RateLimited { retry_after_secs } = self {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from(retry_after_secs),
            );
        }

        response
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
