//! JSON-RPC ledger
//!
//! Talks to an Ethereum-compatible node over HTTP JSON-RPC and signs EIP-155
//! legacy transfers with the faucet's private key. RPC failures are classified
//! into [`LedgerError`] here and nowhere else.

use crate::address::Address;
use crate::error::{FaucetError, FaucetResult};
use crate::ledger::{Ledger, LedgerError, Transfer, TxHash};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Ledger backed by a JSON-RPC node
pub struct JsonRpcLedger {
    rpc_url: String,
    client: reqwest::Client,
    signing_key: SigningKey,
    address: Address,
    chain_id: OnceCell<u64>,
}

impl JsonRpcLedger {
    pub fn new(rpc_url: String, private_key: &str, timeout: Duration) -> FaucetResult<Self> {
        let signing_key = parse_private_key(private_key)?;
        let address = address_of(&signing_key);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaucetError::Config(format!("HTTP client: {}", e)))?;

        info!("Faucet address: {}", address.to_checksum());

        Ok(Self {
            rpc_url,
            client,
            signing_key,
            address,
            chain_id: OnceCell::new(),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let json: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LedgerError::Timeout
            } else {
                LedgerError::Malformed(format!("{}: {}", method, e))
            }
        })?;

        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            debug!("RPC {} returned error: {}", method, message);
            return Err(classify_rpc_error(&message));
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Malformed(format!("{}: missing result", method)))
    }

    fn sign_transfer(&self, transfer: &Transfer, chain_id: u64) -> Result<Vec<u8>, LedgerError> {
        let mut unsigned = RlpStream::new_list(9);
        append_fields(&mut unsigned, transfer);
        unsigned.append(&chain_id);
        unsigned.append_empty_data();
        unsigned.append_empty_data();

        let sighash = keccak_hash::keccak(unsigned.out());
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(sighash.as_bytes())
            .map_err(|e| LedgerError::Rejected(format!("signing failed: {}", e)))?;

        let v = chain_id
            .checked_mul(2)
            .and_then(|c| c.checked_add(35 + recovery_id.to_byte() as u64))
            .ok_or_else(|| LedgerError::Rejected(format!("chain id {} too large", chain_id)))?;
        let sig_bytes = signature.to_bytes();
        let (r, s) = sig_bytes.split_at(32);

        let mut signed = RlpStream::new_list(9);
        append_fields(&mut signed, transfer);
        signed.append(&v);
        signed.append(&trim_leading_zeros(r).to_vec());
        signed.append(&trim_leading_zeros(s).to_vec());

        Ok(signed.out().to_vec())
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.chain_id
            .get_or_try_init(|| async {
                let result = self.call("eth_chainId", json!([])).await?;
                parse_quantity(&result).and_then(|id| {
                    u64::try_from(id)
                        .map_err(|_| LedgerError::Malformed(format!("chain id {} out of range", id)))
                })
            })
            .await
            .copied()
    }

    async fn balance(&self) -> Result<u128, LedgerError> {
        let result = self
            .call("eth_getBalance", json!([self.address.canonical(), "latest"]))
            .await?;
        parse_quantity(&result)
    }

    async fn fee_estimate(&self) -> Result<u128, LedgerError> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    async fn pending_nonce(&self) -> Result<u64, LedgerError> {
        let result = self
            .call(
                "eth_getTransactionCount",
                json!([self.address.canonical(), "pending"]),
            )
            .await?;
        let nonce = parse_quantity(&result)?;
        u64::try_from(nonce).map_err(|_| LedgerError::Malformed(format!("nonce {} out of range", nonce)))
    }

    async fn submit_transfer(&self, transfer: &Transfer) -> Result<TxHash, LedgerError> {
        let chain_id = self.chain_id().await?;
        let raw = self.sign_transfer(transfer, chain_id)?;
        let local_hash = format!("0x{}", hex::encode(keccak_hash::keccak(&raw).as_bytes()));

        let result = self
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(&raw))]),
            )
            .await?;

        match result.as_str() {
            Some(hash) if !hash.is_empty() => {
                if !hash.eq_ignore_ascii_case(&local_hash) {
                    warn!("Node returned hash {} for local hash {}", hash, local_hash);
                }
                Ok(hash.to_string())
            }
            _ => Ok(local_hash),
        }
    }
}

fn append_fields(stream: &mut RlpStream, transfer: &Transfer) {
    stream.append(&transfer.nonce);
    stream.append(&transfer.gas_price);
    stream.append(&transfer.gas_limit);
    stream.append(&transfer.to.0.to_vec());
    stream.append(&transfer.value);
    stream.append_empty_data();
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

fn parse_private_key(private_key: &str) -> FaucetResult<SigningKey> {
    let trimmed = private_key.trim();
    let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_key)
        .map_err(|e| FaucetError::Config(format!("Invalid private key: {}", e)))?;
    if bytes.len() != 32 {
        return Err(FaucetError::Config(format!(
            "Invalid private key: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    SigningKey::from_slice(&bytes)
        .map_err(|e| FaucetError::Config(format!("Invalid signing key: {}", e)))
}

/// Account address for a signing key: last 20 bytes of keccak(pubkey).
pub fn address_of(signing_key: &SigningKey) -> Address {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let hash = keccak_hash::keccak(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address(bytes)
}

fn parse_quantity(value: &Value) -> Result<u128, LedgerError> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::Malformed(format!("expected hex quantity, got {}", value)))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Malformed(format!("quantity without 0x prefix: {}", s)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Malformed(format!("bad quantity {}: {}", s, e)))
}

fn transport_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Timeout
    } else {
        LedgerError::Network(e.to_string())
    }
}

/// Map a node's error message onto the closed error set.
pub fn classify_rpc_error(message: &str) -> LedgerError {
    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") {
        LedgerError::InsufficientFunds
    } else if lower.contains("nonce too low") || lower.contains("already known") {
        LedgerError::NonceTooLow
    } else {
        LedgerError::Rejected(message.to_string())
    }
}
