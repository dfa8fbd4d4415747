//! nockwallet
//!
//! Operator CLI over the wallet engine. Manages the encrypted vault,
//! derives accounts, syncs the local note store against a node, and sends
//! transactions.
//!
//! Usage:
//!   nockwallet init      [--mnemonic "<24 words>"]
//!   nockwallet status
//!   nockwallet accounts
//!   nockwallet new-account [--name <name>]
//!   nockwallet balance
//!   nockwallet sync
//!   nockwallet send      --to <address> --amount <nock> [--fee <nicks>]
//!   nockwallet send-max  --to <address>
//!   nockwallet transactions
//!   nockwallet set-auto-lock --minutes <n>

use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use nockwallet_api::{WalletEngine, WalletRequest};
use nockwallet_core::constants::NICKS_PER_NOCK;
use nockwallet_rpc::HttpNodeClient;
use nockwallet_storage::WalletStorage;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "nockwallet", version, about = "Nockchain wallet — vault, sync and send")]
struct Args {
    /// Wallet data directory.
    #[arg(long, global = true, default_value = "~/.nockwallet")]
    data_dir: PathBuf,

    /// Node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8545")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new vault (generates a mnemonic unless one is given).
    Init {
        /// Import an existing 24-word mnemonic instead of generating one.
        #[arg(long)]
        mnemonic: Option<String>,
    },

    /// Print vault and connection status.
    Status,

    /// List visible accounts.
    Accounts,

    /// Derive the next account.
    NewAccount {
        #[arg(long)]
        name: Option<String>,
    },

    /// Chain balance of the current account.
    Balance,

    /// Reconcile the local note store against the chain.
    Sync,

    /// Send NOCK to an address.
    Send {
        /// Recipient address (base-58).
        #[arg(long)]
        to: String,
        /// Amount in NOCK (converted to nicks internally).
        #[arg(long)]
        amount: f64,
        /// Optional fee in nicks; computed from transaction size if omitted.
        #[arg(long)]
        fee: Option<i64>,
    },

    /// Sweep the full balance of the current account.
    SendMax {
        #[arg(long)]
        to: String,
    },

    /// Wallet transaction history for the current account.
    Transactions,

    /// Set the auto-lock idle window (0 disables).
    SetAutoLock {
        #[arg(long)]
        minutes: u32,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,nockwallet=info")
        .init();

    let args = Args::parse();
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    let storage = Arc::new(
        WalletStorage::open(data_dir.join("wallet.db")).map_err(|e| anyhow::anyhow!("{e}"))?,
    );
    let client = HttpNodeClient::new(&args.rpc);
    let mut engine =
        WalletEngine::new(storage, client).map_err(|e| anyhow::anyhow!("{e}"))?;

    let request = match args.command {
        Command::Init { mnemonic } => {
            let password = prompt_password()?;
            WalletRequest::Setup { password, mnemonic }
        }
        Command::Status => WalletRequest::GetState,
        Command::Accounts => WalletRequest::GetAccounts,
        Command::NewAccount { name } => {
            unlock(&mut engine).await?;
            WalletRequest::CreateAccount { name }
        }
        Command::Balance => WalletRequest::GetBalance,
        Command::Sync => {
            let outcome = engine.sync(now_ms()).await.map_err(|e| anyhow::anyhow!("{e}"))?;
            info!(
                discovered = outcome.discovered,
                spent = outcome.spent,
                confirmed = outcome.confirmed.len(),
                expired = outcome.expired.len(),
                "sync complete"
            );
            return Ok(());
        }
        Command::Send { to, amount, fee } => {
            unlock(&mut engine).await?;
            WalletRequest::SendTransaction {
                to,
                amount: nock_to_nicks(amount)?,
                fee,
                send_max: false,
                origin: None,
            }
        }
        Command::SendMax { to } => {
            unlock(&mut engine).await?;
            WalletRequest::SendTransaction {
                to,
                amount: 0,
                fee: None,
                send_max: true,
                origin: None,
            }
        }
        Command::Transactions => WalletRequest::GetWalletTransactions,
        Command::SetAutoLock { minutes } => WalletRequest::SetAutoLock { minutes },
    };

    let result = engine
        .handle(request, now_ms())
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.code()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn unlock(engine: &mut WalletEngine<HttpNodeClient>) -> anyhow::Result<()> {
    if !engine.vault().is_locked() {
        return Ok(());
    }
    let password = prompt_password()?;
    engine
        .handle(WalletRequest::Unlock { password }, now_ms())
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e, e.code()))?;
    Ok(())
}

fn prompt_password() -> anyhow::Result<String> {
    print!("password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("reading password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("empty password");
    }
    Ok(password)
}

/// Whole-NOCK amounts convert exactly; fractional NOCK rounds to the
/// nearest nick.
fn nock_to_nicks(amount: f64) -> anyhow::Result<u64> {
    if !amount.is_finite() || amount <= 0.0 {
        bail!("amount must be a positive number of NOCK");
    }
    Ok((amount * NICKS_PER_NOCK as f64).round() as u64)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nock_conversion_is_exact_for_whole_units() {
        assert_eq!(nock_to_nicks(1.0).unwrap(), 65_536);
        assert_eq!(nock_to_nicks(0.5).unwrap(), 32_768);
        assert!(nock_to_nicks(0.0).is_err());
        assert!(nock_to_nicks(-2.0).is_err());
    }
}
