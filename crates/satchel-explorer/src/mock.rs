//! In-memory explorer fakes for tests

use std::collections::HashMap;
use std::sync::Mutex;

use satchel_tx::btc::Utxo;

use crate::{BtcExplorer, EvmExplorer, ExplorerError, GasOracle, TxSummary};

/// A scripted Bitcoin explorer: serves configured UTXOs and records
/// broadcasts.
#[derive(Default)]
pub struct MockBtcExplorer {
    utxos: Mutex<HashMap<String, Vec<Utxo>>>,
    fee_per_byte: Mutex<u64>,
    broadcasts: Mutex<Vec<String>>,
    offline: Mutex<bool>,
}

impl MockBtcExplorer {
    pub fn new(fee_per_byte: u64) -> Self {
        Self {
            fee_per_byte: Mutex::new(fee_per_byte),
            ..Self::default()
        }
    }

    pub fn add_utxo(&self, utxo: Utxo) {
        self.utxos
            .lock()
            .unwrap()
            .entry(utxo.address.clone())
            .or_default()
            .push(utxo);
    }

    /// Raw hex of everything broadcast so far.
    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }

    /// Simulate a transport outage.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    fn check_online(&self) -> Result<(), ExplorerError> {
        if *self.offline.lock().unwrap() {
            return Err(ExplorerError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

impl BtcExplorer for MockBtcExplorer {
    fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>, ExplorerError> {
        self.check_online()?;
        Ok(self
            .utxos
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    fn get_tx_history(&self, _address: &str, _limit: u32) -> Result<Vec<TxSummary>, ExplorerError> {
        self.check_online()?;
        Ok(Vec::new())
    }

    fn estimate_fee_per_byte(&self) -> Result<u64, ExplorerError> {
        self.check_online()?;
        Ok(*self.fee_per_byte.lock().unwrap())
    }

    fn broadcast_raw(&self, raw_hex: &str) -> Result<String, ExplorerError> {
        self.check_online()?;
        self.broadcasts.lock().unwrap().push(raw_hex.to_string());
        // A fake txid is enough for the callers
        Ok(format!("{:064x}", self.broadcasts.lock().unwrap().len()))
    }
}

/// A scripted EVM explorer with per-address balances and nonces.
#[derive(Default)]
pub struct MockEvmExplorer {
    balances: Mutex<HashMap<String, String>>,
    nonces: Mutex<HashMap<String, u64>>,
    gas: Mutex<Option<GasOracle>>,
    broadcasts: Mutex<Vec<String>>,
    offline: Mutex<bool>,
}

impl MockEvmExplorer {
    pub fn new() -> Self {
        Self {
            gas: Mutex::new(Some(GasOracle {
                safe: 10,
                propose: 20,
                fast: 40,
            })),
            ..Self::default()
        }
    }

    pub fn set_balance(&self, address: &str, wei: &str) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_ascii_lowercase(), wei.to_string());
    }

    pub fn set_nonce(&self, address: &str, nonce: u64) {
        self.nonces
            .lock()
            .unwrap()
            .insert(address.to_ascii_lowercase(), nonce);
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    fn check_online(&self) -> Result<(), ExplorerError> {
        if *self.offline.lock().unwrap() {
            return Err(ExplorerError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

impl EvmExplorer for MockEvmExplorer {
    fn get_balance(&self, address: &str) -> Result<String, ExplorerError> {
        self.check_online()?;
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| "0".to_string()))
    }

    fn get_tx_count(&self, address: &str) -> Result<u64, ExplorerError> {
        self.check_online()?;
        Ok(*self
            .nonces
            .lock()
            .unwrap()
            .get(&address.to_ascii_lowercase())
            .unwrap_or(&0))
    }

    fn get_gas_oracle(&self) -> Result<GasOracle, ExplorerError> {
        self.check_online()?;
        (*self.gas.lock().unwrap())
            .ok_or_else(|| ExplorerError::Unavailable("no gas oracle".into()))
    }

    fn get_history(&self, _address: &str, _limit: u32) -> Result<Vec<TxSummary>, ExplorerError> {
        self.check_online()?;
        Ok(Vec::new())
    }

    fn send_raw_transaction(&self, raw_hex: &str) -> Result<String, ExplorerError> {
        self.check_online()?;
        if !raw_hex.starts_with("0x") {
            return Err(ExplorerError::Rejected("missing 0x prefix".into()));
        }
        self.broadcasts.lock().unwrap().push(raw_hex.to_string());
        Ok(format!("0x{:064x}", self.broadcasts.lock().unwrap().len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btc_mock_serves_utxos() {
        let explorer = MockBtcExplorer::new(5);
        explorer.add_utxo(Utxo {
            txid: [1; 32],
            vout: 0,
            amount: 10_000,
            address: "addr".into(),
            script_pubkey: vec![],
            confirmations: 3,
        });
        assert_eq!(explorer.get_utxos("addr").unwrap().len(), 1);
        assert!(explorer.get_utxos("other").unwrap().is_empty());
        assert_eq!(explorer.estimate_fee_per_byte().unwrap(), 5);
    }

    #[test]
    fn test_offline_is_unavailable() {
        let explorer = MockBtcExplorer::new(5);
        explorer.set_offline(true);
        assert!(matches!(
            explorer.get_utxos("addr"),
            Err(ExplorerError::Unavailable(_))
        ));
    }

    #[test]
    fn test_evm_mock_balances_and_nonces() {
        let explorer = MockEvmExplorer::new();
        explorer.set_balance("0xAbC0000000000000000000000000000000000001", "1000");
        explorer.set_nonce("0xabc0000000000000000000000000000000000001", 7);

        // Lookup is case-insensitive
        assert_eq!(
            explorer
                .get_balance("0xabc0000000000000000000000000000000000001")
                .unwrap(),
            "1000"
        );
        assert_eq!(
            explorer
                .get_tx_count("0xABC0000000000000000000000000000000000001")
                .unwrap(),
            7
        );
        assert_eq!(explorer.get_balance("0xdead").unwrap(), "0");
    }

    #[test]
    fn test_evm_broadcast_requires_prefix() {
        let explorer = MockEvmExplorer::new();
        assert!(explorer.send_raw_transaction("f86c...").is_err());
        assert!(explorer.send_raw_transaction("0xf86c").is_ok());
        assert_eq!(explorer.broadcasts().len(), 1);
    }
}
