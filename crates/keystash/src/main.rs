//! keystash - manage secrets in a local encrypted vault
//!
//! Commands:
//! - init: Initialize vault, generate identity key
//! - add [VALUE]: Add a secret (prompts if no value)
//! - get: Print one secret's value
//! - list: Show metadata of all matching secrets
//! - update: Change fields of an existing secret
//! - upsert [VALUE]: Replace a secret's value, adding it if missing
//! - remove: Delete matching secrets
//! - status: Show vault location and item count
//! - key: Show public key

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use keystash::{
    AccessibilityPolicy, FileVault, Identifier, KeystashConfig, SecretChanges, SecretKind,
    SecretManager,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keystash")]
#[command(
    about = "Typed secret vault - store passwords, tokens and keys by account, label and service"
)]
#[command(version)]
#[command(after_help = r#"IDENTIFIERS:
    Secrets are located by any combination of:
    --account    e.g. a user name or e-mail address (required when adding)
    --label      human readable item name
    --service    the service the secret belongs to

SECURITY:
    - Items are encrypted with age (X25519 + ChaCha20-Poly1305)
    - Identity key stored in ~/.local/share/keystash/keys/
    - Items stored in ~/.local/share/keystash/vault/items.age
    - Set RUST_LOG=keystash=debug to trace vault calls (values are never logged)"#)]
struct Cli {
    /// Configuration file (default: ~/.config/keystash/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct IdArgs {
    /// Account attribute
    #[arg(short, long)]
    account: Option<String>,

    /// Label attribute
    #[arg(short, long)]
    label: Option<String>,

    /// Service attribute
    #[arg(short, long)]
    service: Option<String>,

    /// Secret kind (generic-password, internet-password, certificate, key, identity)
    #[arg(short, long)]
    kind: Option<SecretKind>,
}

impl IdArgs {
    fn identifier(&self, default_kind: SecretKind) -> Identifier {
        Identifier {
            account: self.account.clone(),
            label: self.label.clone(),
            service: self.service.clone(),
            kind: self.kind.unwrap_or(default_kind),
        }
    }
}

#[derive(Args, Debug, Default)]
struct CreateArgs {
    /// Comment stored with the secret
    #[arg(long)]
    comment: Option<String>,

    /// Accessibility policy (when-unlocked, after-first-unlock, ...)
    #[arg(long)]
    policy: Option<AccessibilityPolicy>,

    /// Mark the secret for synchronization to other devices
    #[arg(long)]
    sync: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize vault and generate X25519 identity key
    Init,

    /// Add a new secret (prompts securely if value not provided)
    Add {
        #[command(flatten)]
        id: IdArgs,
        #[command(flatten)]
        create: CreateArgs,
        /// Secret value (omit for secure hidden prompt)
        value: Option<String>,
    },

    /// Retrieve and print one secret value
    Get {
        /// Don't print trailing newline (useful for piping)
        #[arg(short = 'n')]
        no_newline: bool,
        #[command(flatten)]
        id: IdArgs,
    },

    /// List matching secrets (values hidden)
    List {
        #[command(flatten)]
        id: IdArgs,
        /// Maximum number of secrets to return
        #[arg(long, default_value_t = keystash::DEFAULT_FIND_LIMIT)]
        limit: u32,
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Change fields of an existing secret
    Update {
        #[command(flatten)]
        id: IdArgs,
        #[arg(long)]
        new_account: Option<String>,
        #[arg(long)]
        new_label: Option<String>,
        #[arg(long)]
        new_service: Option<String>,
        #[arg(long)]
        new_comment: Option<String>,
        #[arg(long)]
        new_value: Option<String>,
    },

    /// Replace a secret's value, adding the secret if it does not exist
    Upsert {
        #[command(flatten)]
        id: IdArgs,
        #[command(flatten)]
        create: CreateArgs,
        /// Secret value (omit for secure hidden prompt)
        value: Option<String>,
    },

    /// Remove matching secrets permanently
    Remove {
        #[command(flatten)]
        id: IdArgs,
    },

    /// Show vault location and number of stored items
    Status,

    /// Show your public key
    Key,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KeystashConfig::load_from(path)?,
        None => KeystashConfig::load()?,
    };
    let vault = FileVault::new(&config.vault_root());

    let defaults = config.defaults;
    match cli.command {
        Commands::Init => cmd_init(&vault),
        Commands::Key => cmd_key(&vault),
        Commands::Status => cmd_status(&vault),
        Commands::Add { id, create, value } => {
            let manager = open(vault, &config)?;
            let value = read_value(value)?;
            manager.add(
                &id.identifier(defaults.kind),
                &value,
                create.comment.as_deref(),
                create.policy.unwrap_or(defaults.policy),
                create.sync || defaults.sync,
            )?;
            println!("success: Secret added");
            Ok(())
        }
        Commands::Get { no_newline, id } => {
            let manager = open(vault, &config)?;
            let secret = manager.get_one(&id.identifier(defaults.kind))?;
            if no_newline {
                print!("{}", secret.value);
            } else {
                println!("{}", secret.value);
            }
            Ok(())
        }
        Commands::List { id, limit, json } => {
            let manager = open(vault, &config)?;
            cmd_list(&manager, &id.identifier(defaults.kind), limit, json)
        }
        Commands::Update {
            id,
            new_account,
            new_label,
            new_service,
            new_comment,
            new_value,
        } => {
            let manager = open(vault, &config)?;
            let changes = SecretChanges {
                account: new_account,
                label: new_label,
                service: new_service,
                value: new_value,
                comment: new_comment,
            };
            if changes.is_empty() {
                println!("warning: No changes given, only checking the secret exists");
            }
            manager.update(&id.identifier(defaults.kind), &changes)?;
            println!("success: Secret updated");
            Ok(())
        }
        Commands::Upsert { id, create, value } => {
            let manager = open(vault, &config)?;
            let value = read_value(value)?;
            let processed = manager.add_or_update(
                &id.identifier(defaults.kind),
                &value,
                create.comment.as_deref(),
                create.policy.unwrap_or(defaults.policy),
                create.sync || defaults.sync,
            )?;
            println!("success: Secret {}", processed);
            Ok(())
        }
        Commands::Remove { id } => {
            let manager = open(vault, &config)?;
            manager.remove(&id.identifier(defaults.kind))?;
            println!("success: Secret removed");
            Ok(())
        }
    }
}

/// Wrap an initialized vault in a secret manager
fn open(vault: FileVault, config: &KeystashConfig) -> Result<SecretManager<FileVault>> {
    if !vault.is_initialized() {
        bail!("Vault not initialized - run 'keystash init' first");
    }
    Ok(SecretManager::new(vault, config.manager()))
}

/// Use the given value or prompt for hidden input
fn read_value(value: Option<String>) -> Result<String> {
    let secret_value = match value {
        Some(v) => v,
        None => rpassword::prompt_password("Enter secret value: ")
            .context("Failed to read secret value")?,
    };

    if secret_value.is_empty() {
        bail!("Empty value not allowed");
    }

    Ok(secret_value)
}

/// Initialize the vault
fn cmd_init(vault: &FileVault) -> Result<()> {
    if vault.is_initialized() {
        println!("warning: Vault already initialized");
        println!("Public key: {}", vault.public_key()?);
        return Ok(());
    }

    println!("info: Generating new identity key...");
    let pubkey = vault.init()?;

    println!("success: Vault initialized at {}", vault.root().display());
    println!();
    println!("Your public key:");
    println!("  {}", pubkey);
    println!();
    println!("Add secrets with: keystash add --account <name> [value]");

    Ok(())
}

/// List matching secrets
fn cmd_list(
    manager: &SecretManager<FileVault>,
    identifier: &Identifier,
    limit: u32,
    json: bool,
) -> Result<()> {
    let secrets = manager.get_many(identifier, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&secrets)?);
        return Ok(());
    }

    if secrets.is_empty() {
        println!("No matching secrets found");
        return Ok(());
    }

    println!("Stored Secrets");
    println!();

    for secret in &secrets {
        println!("  {}", secret);
    }

    Ok(())
}

/// Show vault status
fn cmd_status(vault: &FileVault) -> Result<()> {
    println!("Vault: {}", vault.root().display());
    if !vault.is_initialized() {
        println!("Status: not initialized");
        return Ok(());
    }
    let count = vault.verify()?;
    println!("Status: ok");
    println!("Items: {}", count);
    Ok(())
}

/// Show public key
fn cmd_key(vault: &FileVault) -> Result<()> {
    println!("{}", vault.public_key()?);
    Ok(())
}
