//! Satchel transaction engines
//!
//! Bitcoin-family: UTXO selection, fee estimation, legacy SIGHASH_ALL
//! digests, DER low-S scriptSigs, and final serialization for P2PKH
//! spends. EVM: RLP-encoded legacy (type-0) transactions with EIP-155
//! replay protection and a recoverable signature.

pub mod btc;
pub mod evm;
pub mod units;
