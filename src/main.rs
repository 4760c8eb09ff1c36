use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::io::{self, BufRead};
use std::path::PathBuf;
use zeroize::Zeroizing;

use wallet_engine::utils::logging::init_logging;
use wallet_engine::{ApiResponse, EngineSettings, Network, WalletEngine, WalletError, WalletResult};

#[derive(Parser, Debug)]
#[command(name = "wallet-engine", version, about = "Wallet engine host client")]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured network (mainnet, testnet)
    #[arg(long, global = true)]
    network: Option<Network>,

    /// Override the log filter (e.g. "debug", "wallet_engine=trace")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory relative wallet paths resolve against
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Node address recorded with new wallets
    #[arg(long, global = true)]
    node_addr: Option<String>,

    /// Print JSON response envelopes
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Whether a wallet store exists at PATH
    Status { path: PathBuf },
    /// Generate a recovery phrase
    Mnemonic,
    /// Print the word list
    Dictionary,
    /// Validate a receiver address
    CheckAddress { address: String },
    /// Print the default peers
    Peers,
    /// Create a new wallet and print its recovery phrase
    Create {
        path: PathBuf,
        #[command(flatten)]
        secret: PasswordArgs,
        #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
        app_version: String,
    },
    /// Restore a wallet from a recovery phrase
    Restore {
        path: PathBuf,
        #[command(flatten)]
        secret: PasswordArgs,
        /// Environment variable holding the phrase (otherwise read from stdin)
        #[arg(long)]
        phrase_env: Option<String>,
        #[arg(long, default_value = env!("CARGO_PKG_VERSION"))]
        app_version: String,
    },
    /// Check that a wallet opens with the given password
    Open {
        path: PathBuf,
        #[command(flatten)]
        secret: PasswordArgs,
    },
    /// Derive receiver addresses of a wallet
    Address {
        path: PathBuf,
        #[command(flatten)]
        secret: PasswordArgs,
        #[arg(long, default_value_t = 0)]
        start: u32,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Show the public header of a wallet store
    Inspect { path: PathBuf },
}

#[derive(clap::Args, Debug)]
struct PasswordArgs {
    /// Environment variable holding the password (otherwise read from stdin)
    #[arg(long)]
    password_env: Option<String>,
}

/// Command result in both output forms
struct Report {
    json: Value,
    text: String,
}

impl Report {
    fn new(json: Value, text: impl Into<String>) -> Self {
        Self {
            json,
            text: text.into(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&settings.log_level).context("initializing logging")?;

    let engine = WalletEngine::new(settings).context("starting wallet engine")?;
    let json_output = cli.json;

    match run(&engine, cli.command).await {
        Ok(report) => {
            if json_output {
                println!("{}", ApiResponse::ok(report.json).to_json());
            } else {
                println!("{}", report.text);
            }
            Ok(())
        }
        Err(e) => {
            if json_output {
                println!("{}", ApiResponse::<Value>::err(e).to_json());
            } else {
                eprintln!("error: {}", e);
            }
            std::process::exit(1);
        }
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<EngineSettings> {
    let mut settings = match &cli.config {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => EngineSettings::default(),
    };

    if let Some(network) = cli.network {
        settings.network = network;
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    if let Some(addr) = &cli.node_addr {
        settings.node_addr = Some(addr.clone());
    }

    settings.validate().context("invalid settings")?;
    Ok(settings)
}

async fn run(engine: &WalletEngine, command: Commands) -> WalletResult<Report> {
    let mut stdin = io::stdin().lock();

    match command {
        Commands::Status { path } => {
            let initialized = engine.is_wallet_initialized(&path);
            let running = engine.is_wallet_running();
            Ok(Report::new(
                json!({ "initialized": initialized, "running": running }),
                if initialized { "initialized" } else { "uninitialized" },
            ))
        }
        Commands::Mnemonic => {
            let words = engine.create_mnemonic()?;
            let text = words.join(" ");
            Ok(Report::new(json!(words), text))
        }
        Commands::Dictionary => {
            let words = engine.get_dictionary();
            let text = words.join("\n");
            Ok(Report::new(json!(words), text))
        }
        Commands::CheckAddress { address } => {
            let valid = engine.check_receiver_address(&address);
            Ok(Report::new(
                json!({ "address": address.trim(), "valid": valid }),
                if valid { "valid" } else { "invalid" },
            ))
        }
        Commands::Peers => {
            let peers = engine.get_default_peers();
            let text = peers.join("\n");
            Ok(Report::new(json!(peers), text))
        }
        Commands::Create {
            path,
            secret,
            app_version,
        } => {
            let password = read_secret(secret.password_env.as_deref(), "password", &mut stdin)?;
            let wallet = engine
                .create_wallet_async(
                    app_version,
                    String::new(),
                    path,
                    Zeroizing::new(password.expose_secret().to_string()),
                    None,
                    false,
                )
                .await?;
            let phrase = wallet
                .take_recovery_phrase()
                .ok_or_else(|| WalletError::internal("No recovery phrase was generated"))?;
            let info = wallet.info().clone();
            engine.close_wallet();

            let text = format!(
                "Created wallet {}\nWrite down this recovery phrase:\n{}",
                info.id,
                phrase.as_str()
            );
            Ok(Report::new(
                json!({ "wallet": info, "recovery_phrase": phrase.as_str() }),
                text,
            ))
        }
        Commands::Restore {
            path,
            secret,
            phrase_env,
            app_version,
        } => {
            let password = read_secret(secret.password_env.as_deref(), "password", &mut stdin)?;
            let phrase = read_secret(phrase_env.as_deref(), "recovery phrase", &mut stdin)?;
            let wallet = engine
                .create_wallet_async(
                    app_version,
                    String::new(),
                    path,
                    Zeroizing::new(password.expose_secret().to_string()),
                    Some(Zeroizing::new(phrase.expose_secret().to_string())),
                    true,
                )
                .await?;
            let info = wallet.info().clone();
            engine.close_wallet();

            let text = format!("Restored wallet {}", info.id);
            Ok(Report::new(json!({ "wallet": info }), text))
        }
        Commands::Open { path, secret } => {
            let password = read_secret(secret.password_env.as_deref(), "password", &mut stdin)?;
            let wallet = engine
                .open_wallet_async(
                    env!("CARGO_PKG_VERSION").to_string(),
                    String::new(),
                    path,
                    Zeroizing::new(password.expose_secret().to_string()),
                )
                .await?;
            let info = wallet.info().clone();
            let status = wallet.status();
            engine.close_wallet();

            let text = format!("Opened wallet {} (protocol v{})", info.id, info.protocol_version);
            Ok(Report::new(json!({ "wallet": info, "status": status }), text))
        }
        Commands::Address {
            path,
            secret,
            start,
            count,
        } => {
            let password = read_secret(secret.password_env.as_deref(), "password", &mut stdin)?;
            let wallet = engine
                .open_wallet_async(
                    env!("CARGO_PKG_VERSION").to_string(),
                    String::new(),
                    path,
                    Zeroizing::new(password.expose_secret().to_string()),
                )
                .await?;

            let end = start.checked_add(count).ok_or_else(|| {
                WalletError::invalid_input("Address range overflows the index space")
            });
            let addresses = end.and_then(|end| {
                (start..end)
                    .map(|i| wallet.receive_address(i).map(|a| a.to_string()))
                    .collect::<WalletResult<Vec<_>>>()
            });
            engine.close_wallet();
            let addresses = addresses?;

            let text = addresses.join("\n");
            Ok(Report::new(json!(addresses), text))
        }
        Commands::Inspect { path } => {
            let info = engine.inspect_wallet(&path)?;
            let text = format!(
                "id: {}\nprotocol: {}\ncreated: {}\napp version: {}\nnode: {}\nfingerprint: {}",
                info.id,
                info.protocol_version,
                info.created_at,
                info.created_with.app_version,
                info.created_with.node_addr,
                info.fingerprint
            );
            Ok(Report::new(json!(info), text))
        }
    }
}

/// Read a secret from `env_var`, or one line of stdin
fn read_secret(env_var: Option<&str>, what: &str, stdin: &mut impl BufRead) -> WalletResult<SecretString> {
    if let Some(var) = env_var {
        let value = std::env::var(var)
            .map_err(|_| WalletError::invalid_input(format!("Environment variable {} is not set", var)))?;
        return Ok(SecretString::from(value));
    }

    let mut line = Zeroizing::new(String::new());
    stdin.read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.is_empty() {
        return Err(WalletError::invalid_input(format!("No {} given on stdin", what)));
    }
    Ok(SecretString::from(trimmed.to_string()))
}
