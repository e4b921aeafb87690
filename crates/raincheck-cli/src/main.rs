//! CLI entry point for raincheck.
//!
//! This binary provides the `raincheck` command: it keeps the user's API key
//! in the encrypted local vault and sends files to the server for review.

mod cli;
mod client;
mod report;

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use raincheck_vault::{Vault, VaultError, VaultPaths};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ReviewTarget};
use crate::client::ApiClient;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("warn");

    match cli.command {
        Commands::Login { apikey } => cmd_login(&apikey),
        Commands::Logout => cmd_logout(),
        Commands::Status => cmd_status(&cli.server),
        Commands::Review {
            target: ReviewTarget::File { path },
        } => cmd_review_file(&cli.server, &path).await,
    }
}

fn open_vault() -> Result<Vault> {
    let paths = VaultPaths::resolve().context("failed to locate the credential vault")?;
    debug!(vault = %paths.vault_file.display(), "using vault");
    Ok(Vault::new(paths))
}

// ---------------------------------------------------------------------------
// Subcommand: login / logout
// ---------------------------------------------------------------------------

fn cmd_login(apikey: &str) -> Result<()> {
    let apikey = apikey.trim();
    if apikey.is_empty() {
        return Err(anyhow!("API key cannot be empty"));
    }

    let vault = open_vault()?;
    vault.lock(apikey).context("failed to save API key")?;
    info!(vault = %vault.vault_file().display(), "API key stored");
    println!("API key stored successfully");
    Ok(())
}

fn cmd_logout() -> Result<()> {
    let vault = open_vault()?;
    if vault.clear().context("failed to remove API key")? {
        println!("API key removed");
    } else {
        println!("No API key stored");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

fn cmd_status(server: &str) -> Result<()> {
    let vault = open_vault()?;

    println!();
    println!("  raincheck v{}", env!("CARGO_PKG_VERSION"));
    println!("  Server: {server}");
    println!("  Vault:  {}", vault.vault_file().display());

    match vault.unlock() {
        Ok(key) => println!("  API key: stored ({})", mask(&key)),
        Err(err) => println!("  API key: {}", unlock_hint(&err)),
    }
    println!();
    Ok(())
}

/// Show only the last four characters of longer keys.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "****".into();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

// ---------------------------------------------------------------------------
// Subcommand: review file
// ---------------------------------------------------------------------------

async fn cmd_review_file(server: &str, path: &Path) -> Result<()> {
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read file {}", path.display()))?;

    let api_key = open_vault()?
        .unlock()
        .map_err(|err| anyhow!("authentication required: {}", unlock_hint(&err)))?;

    let client = ApiClient::new(server, api_key)?;
    let analysis = client
        .analyze_code(&code)
        .await
        .context("failed to analyze code")?;

    let mut stdout = io::stdout().lock();
    report::render(&mut stdout, &path.display().to_string(), &analysis)?;
    stdout.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An actionable explanation of why the stored key could not be read.
fn unlock_hint(err: &VaultError) -> String {
    match err {
        VaultError::NotFound { .. } => {
            "no API key stored, run `raincheck login <apikey>` first".into()
        }
        VaultError::CorruptVault { .. } | VaultError::Decoding(_) => {
            "the stored API key is unreadable or corrupt, run `raincheck login <apikey>` again"
                .into()
        }
        VaultError::Decryption | VaultError::CorruptKey { .. } => {
            "the stored API key does not match the local key file, \
             run `raincheck login <apikey>` again"
                .into()
        }
        other => format!("failed to read the stored API key: {other}"),
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}
