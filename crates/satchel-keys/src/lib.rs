//! Satchel key hierarchy
//!
//! BIP-39 mnemonics, the BIP-32 extended-key tree, BIP-44 paths, and
//! chain-aware address encoding.
//!
//! # Derivation
//!
//! From a single BIP-39 seed:
//! - Bitcoin-family keys at `m/44'/coin'/account'/change/index` with
//!   legacy P2PKH addresses
//! - EVM keys at `m/44'/60'/account'/change/index` with EIP-55
//!   checksummed addresses (all EVM chains share coin type 60)

pub mod address;
pub mod mnemonic;
pub mod path;
pub mod xkey;

pub use address::Chain;
pub use mnemonic::Mnemonic;
pub use path::DerivationPath;
pub use xkey::{Xprv, Xpub};
