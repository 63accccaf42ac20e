//! ssh-export CLI - Pull SSH keys out of your vault into ~/.ssh
//!
//! Lists the signed-in vault accounts, asks which ones to export from,
//! then writes every SSH key item found as a key pair, backing up any key
//! file it replaces.
//!
//! Usage:
//!   ssh-export                 - Interactive: pick accounts, export keys
//!   ssh-export --select all    - Export from every signed-in account

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use ssh_export::{
    discover::DiscoveryTier,
    writer::PublicKeyStatus,
    Account, Config, ItemOutcome, OpClient, SkipReason, SshKeygen, SyncError, SyncEvent,
    SyncResult, Syncer,
};
use std::io::{self, Write};
use std::path::PathBuf;

/// ssh-export - Export SSH keys from your password manager
#[derive(Parser)]
#[command(name = "ssh-export")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Directory to export keys into (default: ~/.ssh)
    #[arg(long, value_name = "DIR")]
    ssh_dir: Option<PathBuf>,

    /// Accounts to export ("all" or 1-based indices) instead of prompting
    #[arg(long, value_name = "EXPR")]
    select: Option<String>,

    /// Config file (default: ~/.config/ssh-export/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("ssh_export={}", log_level).parse()?),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    if let Some(ssh_dir) = cli.ssh_dir {
        config.ssh_dir = ssh_dir;
    }

    cmd_export(&config, cli.select)
}

// ============ EXPORT COMMAND ============

fn cmd_export(config: &Config, preset_selection: Option<String>) -> Result<()> {
    println!("{}", "🔑 SSH Key Export".bold().cyan());
    println!();

    let client = OpClient::with_binary(&config.vault.binary);
    let keygen = SshKeygen::with_binary(&config.keygen.binary);
    let syncer = Syncer::new(config, &client, &keygen);

    let select = |accounts: &[Account]| -> Result<String> {
        print_accounts(accounts);
        match preset_selection {
            Some(selection) => Ok(selection),
            None => prompt_selection(),
        }
    };

    match syncer.run(select, print_event) {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            if let SyncError::VaultUnavailable(_) = e {
                println!(
                    "  Install the 1Password CLI and sign in with {}",
                    "op signin".cyan()
                );
            } else if let SyncError::NoAccounts = e {
                println!("  Sign in first with {}", "op signin".cyan());
            }
            std::process::exit(1);
        }
    }
}

// ============ HELPER FUNCTIONS ============

fn print_accounts(accounts: &[Account]) {
    println!("Signed-in accounts:");
    for (idx, account) in accounts.iter().enumerate() {
        println!(
            "  {}. {} {}",
            (idx + 1).to_string().cyan(),
            account.email.white().bold(),
            format!("({})", account.url).dimmed()
        );
    }
    println!();
}

/// Read the selection expression from stdin.
fn prompt_selection() -> Result<String> {
    print!("Accounts to export ('all' or numbers separated by spaces): ");
    io::stdout().flush()?;

    let mut input = String::new();
    let read = io::stdin()
        .read_line(&mut input)
        .context("Cannot read selection")?;
    if read == 0 {
        bail!("No selection given (stdin closed)");
    }
    println!();
    Ok(input.trim().to_string())
}

fn print_event(event: SyncEvent<'_>) {
    match event {
        SyncEvent::AccountsFound(_) => {}
        SyncEvent::SelectionRejected(token) => {
            println!("{}", format!("⚠ Ignoring {}", token).yellow());
        }
        SyncEvent::BackupDirCreated(path) => {
            println!("Backup: {}", path.display().to_string().dimmed());
            println!();
        }
        SyncEvent::AccountStarted {
            account,
            position,
            total,
        } => {
            println!(
                "{}",
                format!("Account {}/{}: {}", position, total, account.email).bold()
            );
        }
        SyncEvent::AccountFailed { error, .. } => {
            println!("  {}", format!("⚠ Cannot list items: {}", error).yellow());
            println!();
        }
        SyncEvent::ItemsDiscovered { count, tier, .. } => match tier {
            DiscoveryTier::Category => {
                println!("  Found {} SSH key items", count.to_string().green());
            }
            DiscoveryTier::TitleFallback => {
                println!(
                    "  Found {} items with 'ssh' in the title {}",
                    count.to_string().green(),
                    "(no SSH Key category items)".dimmed()
                );
            }
            DiscoveryTier::Nothing => {
                println!("  {}", "⚠ No SSH keys found in this account".yellow());
                println!();
            }
        },
        SyncEvent::NameReused { item, base } => {
            println!(
                "  {}",
                format!(
                    "⚠ '{}' also maps to {}; the earlier key is in the backup",
                    item.title, base
                )
                .yellow()
            );
        }
        SyncEvent::ItemProcessed { item, outcome } => print_outcome(&item.title, outcome),
    }
}

fn print_outcome(title: &str, outcome: &ItemOutcome) {
    match outcome {
        ItemOutcome::Written { target, report } => {
            println!(
                "  {} {} → {}",
                "✓".green(),
                title.white().bold(),
                target.private_path.display()
            );
            for copy in &report.backed_up {
                println!("    {} {}", "backed up:".dimmed(), copy.display());
            }
            match &report.public {
                PublicKeyStatus::Provided => {}
                PublicKeyStatus::Derived => {
                    println!("    {}", "public key derived from private key".dimmed());
                }
                PublicKeyStatus::Missing { reason } => {
                    println!(
                        "    {}",
                        format!("⚠ No public key written: {}", reason).yellow()
                    );
                }
            }
        }
        ItemOutcome::Skipped(reason) => {
            println!(
                "  {} {} {}",
                "✗".red(),
                title.white().bold(),
                format!("skipped: {}", reason).red()
            );
            if let SkipReason::WriteFailed { backed_up, .. } = reason {
                for copy in backed_up {
                    println!("    {} {}", "backed up:".dimmed(), copy.display());
                }
            }
        }
    }
}

fn print_summary(result: &SyncResult) {
    println!();
    println!("{}", "✓ Export complete!".green().bold());
    println!("  Items found:  {}", result.items_found.to_string().cyan());
    println!("  Keys written: {}", result.keys_written.to_string().green());
    if result.keys_skipped > 0 {
        println!("  Skipped:      {}", result.keys_skipped.to_string().yellow());
    }
    if result.public_keys_missing > 0 {
        println!(
            "  No public key: {}",
            result.public_keys_missing.to_string().yellow()
        );
    }
    if result.backup_kept {
        println!(
            "  Backed up:    {} → {}",
            result.keys_backed_up.to_string().cyan(),
            result.backup_dir.display()
        );
    } else {
        println!("  {}", "No existing keys were replaced".dimmed());
    }
}
