//! Explorer interfaces
//!
//! The core reads balances, UTXOs, nonces, and gas prices from public
//! explorer APIs and broadcasts raw transactions through them — but it
//! never owns the HTTP client. These traits are the whole contract;
//! transports live in the embedding application, and tests use the
//! in-memory fakes from [`mock`].
//!
//! Any transport, serialization, or HTTP failure maps to
//! [`ExplorerError::Unavailable`].

pub mod mock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use satchel_tx::btc::Utxo;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Explorer unavailable: {0}")]
    Unavailable(String),
    #[error("Explorer rejected the request: {0}")]
    Rejected(String),
}

/// One entry of an address's transaction history (both families).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxSummary {
    pub hash: String,
    pub timestamp: i64,
    /// Decimal base-unit amount (sats or wei) as a string; wei
    /// overflows u64.
    pub value: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub is_error: bool,
}

/// Gas-oracle tiers in gwei.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GasOracle {
    pub safe: u64,
    pub propose: u64,
    pub fast: u64,
}

/// Bitcoin-family explorer contract.
pub trait BtcExplorer: Send + Sync {
    fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ExplorerError>;
    fn get_tx_history(&self, address: &str, limit: u32) -> Result<Vec<TxSummary>, ExplorerError>;
    fn estimate_fee_per_byte(&self) -> Result<u64, ExplorerError>;
    /// Broadcast a raw hex transaction; returns the txid.
    fn broadcast_raw(&self, raw_hex: &str) -> Result<String, ExplorerError>;
}

/// EVM-family explorer contract.
pub trait EvmExplorer: Send + Sync {
    /// Balance in wei, as a decimal string.
    fn get_balance(&self, address: &str) -> Result<String, ExplorerError>;
    /// Confirmed transaction count at "latest" — the next nonce.
    fn get_tx_count(&self, address: &str) -> Result<u64, ExplorerError>;
    fn get_gas_oracle(&self) -> Result<GasOracle, ExplorerError>;
    fn get_history(&self, address: &str, limit: u32) -> Result<Vec<TxSummary>, ExplorerError>;
    /// Broadcast a `0x`-prefixed raw transaction; returns the tx hash.
    fn send_raw_transaction(&self, raw_hex: &str) -> Result<String, ExplorerError>;
}

fn unconfigured<T>() -> Result<T, ExplorerError> {
    Err(ExplorerError::Unavailable("no explorer configured".into()))
}

/// Stand-in for deployments without a Bitcoin explorer; every call is
/// [`ExplorerError::Unavailable`].
pub struct UnconfiguredBtcExplorer;

impl BtcExplorer for UnconfiguredBtcExplorer {
    fn get_utxos(&self, _address: &str) -> Result<Vec<Utxo>, ExplorerError> {
        unconfigured()
    }
    fn get_tx_history(&self, _address: &str, _limit: u32) -> Result<Vec<TxSummary>, ExplorerError> {
        unconfigured()
    }
    fn estimate_fee_per_byte(&self) -> Result<u64, ExplorerError> {
        unconfigured()
    }
    fn broadcast_raw(&self, _raw_hex: &str) -> Result<String, ExplorerError> {
        unconfigured()
    }
}

/// Stand-in for deployments without an EVM explorer.
pub struct UnconfiguredEvmExplorer;

impl EvmExplorer for UnconfiguredEvmExplorer {
    fn get_balance(&self, _address: &str) -> Result<String, ExplorerError> {
        unconfigured()
    }
    fn get_tx_count(&self, _address: &str) -> Result<u64, ExplorerError> {
        unconfigured()
    }
    fn get_gas_oracle(&self) -> Result<GasOracle, ExplorerError> {
        unconfigured()
    }
    fn get_history(&self, _address: &str, _limit: u32) -> Result<Vec<TxSummary>, ExplorerError> {
        unconfigured()
    }
    fn send_raw_transaction(&self, _raw_hex: &str) -> Result<String, ExplorerError> {
        unconfigured()
    }
}
