//! Bitcoin-family transaction engine (legacy P2PKH)
//!
//! Largest-first coin selection with fee recomputation, the
//! conservative size estimate `4 + 1 + 148·nIn + 1 + 34·nOut + 4`,
//! legacy SIGHASH_ALL digests, DER-encoded low-S signatures, and the
//! final wire serialization.
//!
//! Txids are stored in internal (serialization) byte order; the display
//! convention reverses them, handled by [`txid_from_hex`] /
//! [`txid_to_hex`].

use thiserror::Error;
use zeroize::Zeroizing;

use satchel_crypto::ec;
use satchel_crypto::encoding::varint;
use satchel_crypto::hash::{hash160, sha256d};

/// Outputs below this many sats are uneconomical to spend.
pub const DUST_THRESHOLD: u64 = 546;

/// SIGHASH_ALL, the only sighash type produced here.
pub const SIGHASH_ALL: u32 = 0x0000_0001;

/// Default sequence (no RBF signaling, no locktime).
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BtcError {
    #[error("Insufficient funds: need {needed} sats, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("Invalid txid hex: {0}")]
    InvalidTxid(String),
    #[error("Input {0} out of range")]
    InputOutOfRange(usize),
    #[error("No key for input {0}")]
    MissingKey(usize),
    #[error("Malformed transaction: {0}")]
    Malformed(String),
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// An unspent output as reported by the explorer.
#[derive(Debug, Clone)]
pub struct Utxo {
    /// Previous txid, internal byte order.
    pub txid: [u8; 32],
    pub vout: u32,
    /// Amount in satoshis.
    pub amount: u64,
    /// The address that owns this output.
    pub address: String,
    pub script_pubkey: Vec<u8>,
    pub confirmations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub prev_txid: [u8; 32],
    pub prev_vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
}

/// A version-1 legacy transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinTx {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub locktime: u32,
}

/// Parse a display-order txid hex string into internal byte order.
pub fn txid_from_hex(s: &str) -> Result<[u8; 32], BtcError> {
    let bytes = hex::decode(s).map_err(|e| BtcError::InvalidTxid(e.to_string()))?;
    let mut txid: [u8; 32] = bytes
        .try_into()
        .map_err(|_| BtcError::InvalidTxid("txid must be 32 bytes".into()))?;
    txid.reverse();
    Ok(txid)
}

/// Render an internal-order txid in the display convention.
pub fn txid_to_hex(txid: &[u8; 32]) -> String {
    let mut reversed = *txid;
    reversed.reverse();
    hex::encode(reversed)
}

/// `OP_DUP OP_HASH160 <pkh> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(0x76); // OP_DUP
    script.push(0xa9); // OP_HASH160
    script.push(0x14); // push 20 bytes
    script.extend_from_slice(pubkey_hash);
    script.push(0x88); // OP_EQUALVERIFY
    script.push(0xac); // OP_CHECKSIG
    script
}

/// Conservative worst-case size for a compressed-pubkey P2PKH spend.
pub fn estimate_size(n_inputs: usize, n_outputs: usize) -> usize {
    4 + 1 + 148 * n_inputs + 1 + 34 * n_outputs + 4
}

/// Fee for the estimated size at `fee_per_byte`.
pub fn estimate_fee(n_inputs: usize, n_outputs: usize, fee_per_byte: u64) -> u64 {
    estimate_size(n_inputs, n_outputs) as u64 * fee_per_byte
}

/// The result of coin selection: which UTXOs to spend, the fee that was
/// reserved, and the change amount (zero when rolled into the fee).
#[derive(Debug, Clone)]
pub struct CoinSelection {
    pub utxos: Vec<Utxo>,
    pub total_input: u64,
    pub fee: u64,
    pub change: u64,
}

/// Largest-first selection: sort by amount descending, accumulate until
/// the inputs cover `target + fee`, recomputing the fee (two outputs
/// assumed) after each inclusion. Change below the dust threshold is
/// dropped and rolled into the fee.
pub fn select_coins(
    available: &[Utxo],
    target: u64,
    fee_per_byte: u64,
) -> Result<CoinSelection, BtcError> {
    let mut sorted: Vec<Utxo> = available.to_vec();
    sorted.sort_by(|a, b| b.amount.cmp(&a.amount));

    let mut selected = Vec::new();
    let mut total: u64 = 0;
    for utxo in sorted {
        total = total.saturating_add(utxo.amount);
        selected.push(utxo);

        let fee = estimate_fee(selected.len(), 2, fee_per_byte);
        let needed = target.saturating_add(fee);
        if total >= needed {
            let change = total - needed;
            if change < DUST_THRESHOLD {
                // Sub-dust change is burned as extra fee
                return Ok(CoinSelection {
                    utxos: selected,
                    total_input: total,
                    fee: fee + change,
                    change: 0,
                });
            }
            return Ok(CoinSelection {
                utxos: selected,
                total_input: total,
                fee,
                change,
            });
        }
    }

    let available_total: u64 = available.iter().map(|u| u.amount).sum();
    Err(BtcError::InsufficientFunds {
        needed: target.saturating_add(estimate_fee(available.len().max(1), 2, fee_per_byte)),
        available: available_total,
    })
}

/// Assemble the unsigned transaction for a selection: one recipient
/// output, plus a change output when the selection kept one.
pub fn build_unsigned(
    selection: &CoinSelection,
    recipient_script: Vec<u8>,
    change_script: Vec<u8>,
    amount: u64,
) -> BitcoinTx {
    let inputs = selection
        .utxos
        .iter()
        .map(|u| TxIn {
            prev_txid: u.txid,
            prev_vout: u.vout,
            script_sig: Vec::new(),
            sequence: SEQUENCE_FINAL,
        })
        .collect();

    let mut outputs = vec![TxOut {
        amount,
        script_pubkey: recipient_script,
    }];
    if selection.change > 0 {
        outputs.push(TxOut {
            amount: selection.change,
            script_pubkey: change_script,
        });
    }

    BitcoinTx {
        version: 1,
        inputs,
        outputs,
        locktime: 0,
    }
}

/// Legacy SIGHASH_ALL digest for `input_index`.
///
/// Every input's scriptSig is replaced by the empty script except the
/// one being signed, which carries the previous output's scriptPubKey;
/// the 4-byte little-endian sighash type is appended and the whole
/// preimage double-SHA-256 hashed.
pub fn sighash(
    tx: &BitcoinTx,
    input_index: usize,
    prev_script_pubkey: &[u8],
) -> Result<[u8; 32], BtcError> {
    if input_index >= tx.inputs.len() {
        return Err(BtcError::InputOutOfRange(input_index));
    }

    let mut preimage = Vec::with_capacity(estimate_size(tx.inputs.len(), tx.outputs.len()));
    preimage.extend_from_slice(&tx.version.to_le_bytes());

    varint::write(&mut preimage, tx.inputs.len() as u64);
    for (i, input) in tx.inputs.iter().enumerate() {
        preimage.extend_from_slice(&input.prev_txid);
        preimage.extend_from_slice(&input.prev_vout.to_le_bytes());
        if i == input_index {
            varint::write(&mut preimage, prev_script_pubkey.len() as u64);
            preimage.extend_from_slice(prev_script_pubkey);
        } else {
            varint::write(&mut preimage, 0);
        }
        preimage.extend_from_slice(&input.sequence.to_le_bytes());
    }

    varint::write(&mut preimage, tx.outputs.len() as u64);
    for output in &tx.outputs {
        preimage.extend_from_slice(&output.amount.to_le_bytes());
        varint::write(&mut preimage, output.script_pubkey.len() as u64);
        preimage.extend_from_slice(&output.script_pubkey);
    }

    preimage.extend_from_slice(&tx.locktime.to_le_bytes());
    preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

    Ok(sha256d(&preimage))
}

/// Sign every input with the matching key from `keys`
/// (one 32-byte secret per input, aligned with `prevouts`).
///
/// ScriptSig layout: `push(DER ‖ 0x01) push(compressed pubkey)`.
pub fn sign_all(
    tx: &mut BitcoinTx,
    prevouts: &[Vec<u8>],
    keys: &[Zeroizing<[u8; 32]>],
) -> Result<(), BtcError> {
    if prevouts.len() != tx.inputs.len() || keys.len() != tx.inputs.len() {
        return Err(BtcError::Malformed(
            "prevouts/keys must align with inputs".into(),
        ));
    }

    for index in 0..tx.inputs.len() {
        let digest = sighash(tx, index, &prevouts[index])?;
        let der = ec::ecdsa_sign_der(&keys[index], &digest)
            .map_err(|e| BtcError::Signing(e.to_string()))?;
        let pubkey = ec::pubkey_from_secret(&keys[index])
            .map_err(|e| BtcError::Signing(e.to_string()))?;

        let mut script_sig = Vec::with_capacity(der.len() + 2 + 1 + 33 + 1);
        script_sig.push((der.len() + 1) as u8);
        script_sig.extend_from_slice(&der);
        script_sig.push(SIGHASH_ALL as u8);
        script_sig.push(33);
        script_sig.extend_from_slice(&pubkey);

        tx.inputs[index].script_sig = script_sig;
    }
    Ok(())
}

/// Wire serialization of a legacy transaction.
pub fn serialize(tx: &BitcoinTx) -> Vec<u8> {
    let mut out = Vec::with_capacity(estimate_size(tx.inputs.len(), tx.outputs.len()));
    out.extend_from_slice(&tx.version.to_le_bytes());

    varint::write(&mut out, tx.inputs.len() as u64);
    for input in &tx.inputs {
        out.extend_from_slice(&input.prev_txid);
        out.extend_from_slice(&input.prev_vout.to_le_bytes());
        varint::write(&mut out, input.script_sig.len() as u64);
        out.extend_from_slice(&input.script_sig);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }

    varint::write(&mut out, tx.outputs.len() as u64);
    for output in &tx.outputs {
        out.extend_from_slice(&output.amount.to_le_bytes());
        varint::write(&mut out, output.script_pubkey.len() as u64);
        out.extend_from_slice(&output.script_pubkey);
    }

    out.extend_from_slice(&tx.locktime.to_le_bytes());
    out
}

/// Parse a legacy serialization back into a [`BitcoinTx`].
pub fn deserialize(data: &[u8]) -> Result<BitcoinTx, BtcError> {
    let mut cursor = Cursor { data, pos: 0 };

    let version = cursor.read_u32()?;
    let n_inputs = cursor.read_varint()?;
    let mut inputs = Vec::with_capacity(n_inputs.min(1024) as usize);
    for _ in 0..n_inputs {
        let prev_txid = cursor.read_array::<32>()?;
        let prev_vout = cursor.read_u32()?;
        let script_len = cursor.read_varint()?;
        let script_sig = cursor.read_bytes(script_len as usize)?.to_vec();
        let sequence = cursor.read_u32()?;
        inputs.push(TxIn {
            prev_txid,
            prev_vout,
            script_sig,
            sequence,
        });
    }

    let n_outputs = cursor.read_varint()?;
    let mut outputs = Vec::with_capacity(n_outputs.min(1024) as usize);
    for _ in 0..n_outputs {
        let amount = cursor.read_u64()?;
        let script_len = cursor.read_varint()?;
        let script_pubkey = cursor.read_bytes(script_len as usize)?.to_vec();
        outputs.push(TxOut {
            amount,
            script_pubkey,
        });
    }

    let locktime = cursor.read_u32()?;
    if cursor.pos != data.len() {
        return Err(BtcError::Malformed("trailing bytes".into()));
    }

    Ok(BitcoinTx {
        version,
        inputs,
        outputs,
        locktime,
    })
}

/// Display-convention txid: reversed double-SHA-256 of the final
/// serialization.
pub fn txid(tx: &BitcoinTx) -> String {
    let digest = sha256d(&serialize(tx));
    txid_to_hex(&digest)
}

/// Pubkey hash for a compressed public key, for script construction.
pub fn pubkey_hash(pubkey33: &[u8; 33]) -> [u8; 20] {
    hash160(pubkey33)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BtcError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| BtcError::Malformed("truncated".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BtcError> {
        Ok(self.read_bytes(N)?.try_into().expect("length checked"))
    }

    fn read_u32(&mut self) -> Result<u32, BtcError> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }

    fn read_u64(&mut self) -> Result<u64, BtcError> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    fn read_varint(&mut self) -> Result<u64, BtcError> {
        let (value, used) = varint::read(&self.data[self.pos..])
            .map_err(|e| BtcError::Malformed(e.to_string()))?;
        self.pos += used;
        Ok(value)
    }
}
