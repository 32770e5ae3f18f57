//! ERC-20 token registry
//!
//! Per-wallet list of tracked token contracts, keyed by
//! `(wallet_id, contract_address)`. Addresses are stored lowercase so
//! the uniqueness constraint ignores checksum casing.

use rusqlite::Row;

use crate::{SqlValue, Vault, VaultError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: i64,
    pub wallet_id: i64,
    pub contract_address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub created_at: i64,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<TokenRecord> {
    Ok(TokenRecord {
        id: row.get("id")?,
        wallet_id: row.get("wallet_id")?,
        contract_address: row.get("contract_address")?,
        symbol: row.get("symbol")?,
        name: row.get("name")?,
        decimals: row.get("decimals")?,
        created_at: row.get("created_at")?,
    })
}

const SELECT: &str = "SELECT id, wallet_id, contract_address, symbol, name, decimals,
    created_at FROM erc20_tokens";

fn normalize(contract_address: &str) -> Result<String, VaultError> {
    let addr = contract_address.to_ascii_lowercase();
    let body = addr
        .strip_prefix("0x")
        .ok_or_else(|| VaultError::InvalidInput("contract address must be 0x-hex".into()))?;
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(VaultError::InvalidInput(format!(
            "not a contract address: {contract_address}"
        )));
    }
    Ok(addr)
}

pub fn add(
    vault: &Vault,
    wallet_id: i64,
    contract_address: &str,
    symbol: &str,
    name: &str,
    decimals: u8,
) -> Result<i64, VaultError> {
    let address = normalize(contract_address)?;
    let result = vault.execute(
        "INSERT INTO erc20_tokens (wallet_id, contract_address, symbol, name, decimals, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        &[
            SqlValue::Integer(wallet_id),
            SqlValue::Text(address.clone()),
            SqlValue::Text(symbol.to_string()),
            SqlValue::Text(name.to_string()),
            SqlValue::Integer(i64::from(decimals)),
            SqlValue::Integer(Vault::now()),
        ],
    );
    vault.audit.record(
        "add_token",
        &format!("wallet_id={wallet_id} contract={address}"),
        result.is_ok(),
    );
    result?;
    Ok(vault.conn().last_insert_rowid())
}

pub fn get(
    vault: &Vault,
    wallet_id: i64,
    contract_address: &str,
) -> Result<TokenRecord, VaultError> {
    let address = normalize(contract_address)?;
    let conn = vault.conn();
    let mut stmt = conn.prepare_cached(&format!(
        "{SELECT} WHERE wallet_id = ?1 AND contract_address = ?2"
    ))?;
    let token = stmt.query_row(rusqlite::params![wallet_id, address], from_row)?;
    Ok(token)
}

pub fn list(vault: &Vault, wallet_id: i64) -> Result<Vec<TokenRecord>, VaultError> {
    let conn = vault.conn();
    let mut stmt =
        conn.prepare_cached(&format!("{SELECT} WHERE wallet_id = ?1 ORDER BY symbol"))?;
    let tokens = stmt
        .query_map([wallet_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tokens)
}

pub fn remove(vault: &Vault, wallet_id: i64, contract_address: &str) -> Result<(), VaultError> {
    let address = normalize(contract_address)?;
    let n = vault.execute(
        "DELETE FROM erc20_tokens WHERE wallet_id = ?1 AND contract_address = ?2",
        &[SqlValue::Integer(wallet_id), SqlValue::Text(address.clone())],
    )?;
    vault.audit.record(
        "remove_token",
        &format!("wallet_id={wallet_id} contract={address}"),
        n == 1,
    );
    if n == 0 {
        return Err(VaultError::NotFound);
    }
    Ok(())
}
