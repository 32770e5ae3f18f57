//! Satchel headless front end.
//!
//! Every command is self-contained: commands that need an unlocked
//! wallet log in, do their work, and log out within one invocation.
//! The vault key lives in a 0600 file next to the database, created on
//! first run.

mod config;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

use config::CliConfig;
use satchel_core::{Core, LoginOutcome};
use satchel_explorer::{UnconfiguredBtcExplorer, UnconfiguredEvmExplorer};
use satchel_keys::address::Chain;
use satchel_notify::smtp::SmtpMailer;
use satchel_notify::{Mailer, UnavailableMailer};
use satchel_store::{backup, Vault};

#[derive(Parser)]
#[command(name = "satchel", about = "HD multi-chain wallet", version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and a fresh wallet; prints the mnemonic once
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
    /// Submit an email verification code
    VerifyEmail {
        #[arg(long)]
        username: String,
        #[arg(long)]
        code: String,
    },
    /// Re-send the verification code
    ResendCode {
        #[arg(long)]
        username: String,
    },
    /// Derive a receive address
    Address {
        #[arg(long)]
        username: String,
        /// bitcoin | bitcoin-testnet | litecoin | litecoin-testnet | ethereum
        #[arg(long, default_value = "bitcoin")]
        chain: String,
        #[arg(long, default_value_t = 0)]
        account: u32,
        #[arg(long, default_value_t = 0)]
        change: u32,
        #[arg(long, default_value_t = 0)]
        index: u32,
    },
    /// Reveal the wallet seed (hex); requires the password
    Reveal {
        #[arg(long)]
        username: String,
    },
    /// Replace the wallet seed from a recovery phrase
    Restore {
        #[arg(long)]
        username: String,
        /// Optional BIP-39 passphrase
        #[arg(long, default_value = "")]
        passphrase: String,
    },
    /// Track an ERC-20 contract
    TokenAdd {
        #[arg(long)]
        username: String,
        #[arg(long)]
        contract: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 18)]
        decimals: u8,
    },
    /// List tracked ERC-20 contracts
    TokenList {
        #[arg(long)]
        username: String,
    },
    /// Vault health: schema version, integrity, recent audit entries
    Status,
    /// Copy the vault to a new encrypted file
    Backup {
        #[arg(long)]
        dest: PathBuf,
    },
    /// Rotate the vault key file
    RotateKey,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    env_logger::Builder::new()
        .parse_filters(&config.storage.log_level)
        .init();

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!(
            "failed to create data dir {}",
            config.storage.data_dir.display()
        )
    })?;

    let vault_key = load_or_create_key(&config)?;
    let vault = Vault::open_with_audit(
        &config.vault_path(),
        &vault_key,
        Some(&config.audit_path()),
    )?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp.clone())?),
        None => Arc::new(UnavailableMailer),
    };
    let core = Core::new(
        vault,
        mailer,
        Arc::new(UnconfiguredBtcExplorer),
        Arc::new(UnconfiguredEvmExplorer),
    );

    match cli.command {
        Command::Register { username, email } => {
            let password = prompt_password("Choose a password: ")?;
            let registration = core.register(&username, &email, &password)?;
            println!("Account created.");
            println!();
            println!("Write down your recovery phrase. It is shown ONCE and never stored:");
            println!();
            println!("    {}", &*registration.mnemonic);
            println!();
            println!("Anyone with these words can spend your funds.");
        }
        Command::VerifyEmail { username, code } => {
            core.verify_email_code(&username, &code)?;
            println!("Email verified. You can now log in.");
        }
        Command::ResendCode { username } => {
            core.resend_code(&username)?;
            println!("Verification code sent.");
        }
        Command::Address {
            username,
            chain,
            account,
            change,
            index,
        } => {
            let chain = parse_chain(&chain)?;
            let password = prompt_password("Password: ")?;
            let session = login_session(&core, &username, &password)?;
            let address = core.derive_address(&session, chain, account, change, index)?;
            core.logout(&session)?;
            println!("{address}");
        }
        Command::Reveal { username } => {
            let password = prompt_password("Password: ")?;
            let seed_hex = core.reveal_seed(&username, &password)?;
            println!("Seed (hex): {}", &*seed_hex);
        }
        Command::Restore {
            username,
            passphrase,
        } => {
            let mnemonic = prompt_line("Recovery phrase: ")?;
            let password = prompt_password("Password: ")?;
            core.restore_from_seed(&username, mnemonic.trim(), &passphrase, &password)?;
            println!("Wallet restored.");
        }
        Command::TokenAdd {
            username,
            contract,
            symbol,
            name,
            decimals,
        } => {
            let password = prompt_password("Password: ")?;
            let session = login_session(&core, &username, &password)?;
            core.register_token(&session, &contract, &symbol, &name, decimals)?;
            core.logout(&session)?;
            println!("Token {symbol} registered.");
        }
        Command::TokenList { username } => {
            let password = prompt_password("Password: ")?;
            let session = login_session(&core, &username, &password)?;
            let tokens = core.list_tokens(&session)?;
            core.logout(&session)?;
            if tokens.is_empty() {
                println!("No tokens registered.");
            }
            for token in tokens {
                println!(
                    "{}\t{}\t{} decimals\t{}",
                    token.symbol, token.name, token.decimals, token.contract_address
                );
            }
        }
        Command::Status => {
            let version = core.vault().schema_version()?;
            core.vault().verify_integrity()?;
            println!("Vault: {}", config.vault_path().display());
            println!("Schema version: {version}");
            println!("Integrity: ok");
            let entries = core.audit_recent(10);
            if !entries.is_empty() {
                println!("Recent operations:");
                for entry in entries {
                    println!("  {entry}");
                }
            }
        }
        Command::Backup { dest } => {
            backup::create_backup(core.vault(), &dest)?;
            println!("Backup written to {}", dest.display());
        }
        Command::RotateKey => {
            let new_key = generate_key()?;
            // Stage the key file first so a crash between the two steps
            // leaves both keys on disk rather than neither
            let staged = config.key_path().with_extension("key.new");
            write_key_file(&staged, &new_key)?;
            core.vault().rotate_key(&new_key)?;
            std::fs::rename(&staged, config.key_path())?;
            println!("Vault key rotated.");
        }
    }

    Ok(())
}

fn parse_chain(name: &str) -> Result<Chain> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "bitcoin" | "btc" => Chain::Bitcoin,
        "bitcoin-testnet" | "testnet" => Chain::BitcoinTestnet,
        "litecoin" | "ltc" => Chain::Litecoin,
        "litecoin-testnet" => Chain::LitecoinTestnet,
        "ethereum" | "eth" | "evm" => Chain::Ethereum,
        other => bail!("unknown chain '{other}'"),
    })
}

fn login_session(core: &Core, username: &str, password: &str) -> Result<String> {
    match core.login(username, password, Some("satchel-cli".into()))? {
        LoginOutcome::SessionIssued { session_id } => Ok(session_id),
        LoginOutcome::RequiresEmailVerification => {
            bail!("email not verified yet; check your inbox and run verify-email")
        }
    }
}

fn load_or_create_key(config: &CliConfig) -> Result<Vec<u8>> {
    let path = config.key_path();
    if path.exists() {
        let hex_key = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let key = hex::decode(hex_key.trim()).context("vault key file is not hex")?;
        if key.len() < 32 {
            bail!("vault key file is too short");
        }
        return Ok(key);
    }
    let key = generate_key()?;
    write_key_file(&path, &key)?;
    log::info!("generated new vault key at {}", path.display());
    Ok(key)
}

fn generate_key() -> Result<Vec<u8>> {
    let key: [u8; 32] =
        satchel_crypto::rng::random_array().map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(key.to_vec())
}

fn write_key_file(path: &PathBuf, key: &[u8]) -> Result<()> {
    std::fs::write(path, hex::encode(key))
        .with_context(|| format!("failed to write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<Zeroizing<String>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read input")?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

// Passwords are read from the terminal line; headless callers pipe
// them on stdin. TODO: switch to termios echo-off once the MSRV
// discussion settles on a terminal crate.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    prompt_line(prompt)
}
