//! gmvault CLI - Command line interface for the vault core.
//!
//! Creates the vault credential, logs in, checks session tokens and
//! encrypts or decrypts single field values with the master password.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroize;

use gmvault_common::{Error, Password};
use gmvault_crypto::KdfParams;
use gmvault_vault::{decrypt_field, encrypt_field, AccountFields, VaultManager, VaultSettings};

#[derive(Parser)]
#[command(name = "gmvault")]
#[command(about = "gmvault - Zero-knowledge vault core")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Settings file (JSON). Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database holding the vault credential.
    #[arg(long, default_value = "gmvault.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vault credential.
    Init {
        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long)]
        strength: Option<String>,
    },

    /// Show whether the vault exists and its KDF parameters.
    Status,

    /// Verify the master password and print a session token.
    Login,

    /// Check a session token.
    CheckToken {
        /// The token printed by `login`.
        token: String,
    },

    /// Change the master password.
    ChangePassword {
        /// JSON file of encrypted accounts to re-encrypt under the new password.
        #[arg(short, long)]
        migrate: Option<PathBuf>,
    },

    /// Encrypt a value with the vault key.
    Encrypt {
        /// Value to encrypt (prompted for if omitted).
        value: Option<String>,
    },

    /// Decrypt a value produced by `encrypt`.
    Decrypt {
        /// Base64 envelope.
        envelope: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { strength } => cmd_init(settings, &cli.db, strength.as_deref()),

        Commands::Status => cmd_status(settings, &cli.db),

        Commands::Login => cmd_login(settings, &cli.db),

        Commands::CheckToken { token } => cmd_check_token(settings, &cli.db, &token),

        Commands::ChangePassword { migrate } => {
            cmd_change_password(settings, &cli.db, migrate.as_deref())
        }

        Commands::Encrypt { value } => cmd_encrypt(settings, &cli.db, value),

        Commands::Decrypt { envelope } => cmd_decrypt(settings, &cli.db, &envelope),
    }
}

/// Read settings from the file (if any), then the environment.
fn load_settings(path: Option<&Path>) -> Result<VaultSettings> {
    let mut settings = match path {
        Some(path) => VaultSettings::load(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?,
        None => VaultSettings::default(),
    };
    settings
        .apply_env()
        .context("Invalid settings in environment")?;
    Ok(settings)
}

fn open_vault(settings: VaultSettings, db: &Path) -> Result<VaultManager> {
    let config = serde_json::json!({ "path": db.to_string_lossy() });
    VaultManager::open(settings, "sqlite", config).context("Failed to open vault")
}

/// Report a vault error without internal detail.
fn public(err: Error) -> anyhow::Error {
    debug!(kind = err.kind(), "Vault operation failed");
    anyhow::Error::new(err.public())
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Password> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Password::from(password))
}

/// Prompt twice and require both entries to match.
fn prompt_new_password(prompt: &str) -> Result<Password> {
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;

    if password.as_bytes() != confirm.as_bytes() {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

/// Create the vault credential.
fn cmd_init(mut settings: VaultSettings, db: &Path, strength: Option<&str>) -> Result<()> {
    if let Some(strength) = strength {
        settings.kdf = match strength {
            "interactive" => KdfParams::interactive(),
            "moderate" => KdfParams::moderate(),
            "sensitive" => KdfParams::sensitive(),
            _ => {
                anyhow::bail!("Invalid strength. Use: interactive, moderate, or sensitive");
            }
        };
    }

    let vault = open_vault(settings, db)?;
    if vault.is_initialized().map_err(public)? {
        anyhow::bail!("Vault already exists at {}", db.display());
    }

    info!("Creating vault: {}", db.display());
    let password = prompt_new_password("Enter master password: ")?;
    vault.register(&password).map_err(public)?;

    let kdf = &vault.settings().kdf;
    println!("Vault created successfully!");
    println!("  Location: {}", db.display());
    println!(
        "  KDF: Argon2id, {} KiB, {} passes, parallelism {}",
        kdf.memory_cost, kdf.work_factor, kdf.parallelism
    );

    Ok(())
}

/// Show vault information.
fn cmd_status(settings: VaultSettings, db: &Path) -> Result<()> {
    let vault = open_vault(settings, db)?;

    if !vault.is_initialized().map_err(public)? {
        println!("No vault at {}. Run `gmvault init`.", db.display());
        return Ok(());
    }

    let credential = vault
        .store()
        .load()
        .context("Failed to read vault credential")?;
    let kdf = credential.kdf();

    println!("Vault Information:");
    println!("  Location: {}", db.display());
    println!("  Backend: {}", vault.store().backend());
    println!("  Created: {}", credential.created_at());
    println!("  Modified: {}", credential.updated_at());
    println!("  KDF Parameters:");
    println!("    Memory: {} KiB", kdf.memory_cost);
    println!("    Work factor: {} passes", kdf.work_factor);
    println!("    Parallelism: {}", kdf.parallelism);

    Ok(())
}

/// Log in and print a session token.
fn cmd_login(settings: VaultSettings, db: &Path) -> Result<()> {
    let vault = open_vault(settings, db)?;
    let password = prompt_password("Enter master password: ")?;

    let token = vault.login(&password).map_err(public)?;
    let claims = vault.authorize(token.as_str()).map_err(public)?;

    eprintln!("Session valid until {}", claims.expires_at());
    println!("{}", token.as_str());

    Ok(())
}

/// Check a session token.
fn cmd_check_token(settings: VaultSettings, db: &Path, token: &str) -> Result<()> {
    let vault = open_vault(settings, db)?;
    let claims = vault.authorize(token.trim()).map_err(public)?;

    println!("Token valid.");
    println!("  Subject: {}", claims.subject());
    println!("  Issued: {}", claims.issued_at());
    println!("  Expires: {}", claims.expires_at());

    Ok(())
}

/// Change the master password, optionally migrating an accounts file.
fn cmd_change_password(settings: VaultSettings, db: &Path, migrate: Option<&Path>) -> Result<()> {
    let vault = open_vault(settings, db)?;

    let accounts: Option<Vec<AccountFields>> = match migrate {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Some(serde_json::from_str(&json).context("Accounts file is not valid JSON")?)
        }
        None => None,
    };

    let old_password = prompt_password("Enter current password: ")?;
    let new_password = prompt_new_password("Enter new password: ")?;

    match (migrate, accounts) {
        (Some(path), Some(accounts)) => {
            info!("Re-encrypting {} accounts", accounts.len());
            let staged = vault
                .change_password_and_migrate(&old_password, &new_password, |old_key, new_key| {
                    let migrated = accounts
                        .iter()
                        .map(|account| account.reencrypt(old_key, new_key))
                        .collect::<gmvault_common::Result<Vec<_>>>()?;
                    stage_accounts(path, &migrated)
                })
                .map_err(public)?;

            if let Err(e) = staged.persist(path) {
                let reason = e.error.to_string();
                let kept = e
                    .file
                    .keep()
                    .map(|(_, kept)| kept.display().to_string())
                    .unwrap_or_else(|_| "a lost temporary file".to_string());
                anyhow::bail!(
                    "Password changed, but {} was not replaced ({}). Migrated accounts are in {}",
                    path.display(),
                    reason,
                    kept
                );
            }
            println!("Password changed and {} accounts re-encrypted.", accounts.len());
        }
        _ => {
            vault
                .change_password(&old_password, &new_password)
                .map_err(public)?;
            println!("Password changed successfully!");
            println!("Data encrypted under the old password can no longer be decrypted.");
        }
    }

    Ok(())
}

/// Write `accounts` to a temporary file next to `path`.
///
/// The file is removed on drop unless persisted, so it only replaces
/// `path` once the new credential is committed.
fn stage_accounts(
    path: &Path,
    accounts: &[AccountFields],
) -> gmvault_common::Result<NamedTempFile> {
    let json = serde_json::to_vec_pretty(accounts)
        .map_err(|e| Error::Serialization(e.to_string()))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&json)?;
    file.as_file().sync_all()?;
    debug!(path = %file.path().display(), "Migrated accounts staged");
    Ok(file)
}

/// Encrypt one value.
fn cmd_encrypt(settings: VaultSettings, db: &Path, value: Option<String>) -> Result<()> {
    let mut value = match value {
        Some(value) => value,
        None => rpassword::prompt_password("Value to encrypt: ").context("Failed to read value")?,
    };

    let vault = open_vault(settings, db)?;
    let password = prompt_password("Enter master password: ")?;
    let key = vault.unlock(&password).map_err(public)?;

    let envelope = encrypt_field(Some(value.as_str()), &key).map_err(public)?;
    value.zeroize();

    if let Some(envelope) = envelope {
        println!("{}", envelope);
    }

    Ok(())
}

/// Decrypt one value.
fn cmd_decrypt(settings: VaultSettings, db: &Path, envelope: &str) -> Result<()> {
    let vault = open_vault(settings, db)?;
    let password = prompt_password("Enter master password: ")?;
    let key = vault.unlock(&password).map_err(public)?;

    let plaintext = decrypt_field(Some(envelope.trim()), &key).map_err(public)?;
    if let Some(mut plaintext) = plaintext {
        println!("{}", plaintext);
        plaintext.zeroize();
    }

    Ok(())
}
