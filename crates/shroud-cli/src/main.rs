//! shroud: client-side payload encryption CLI
//!
//! Key management:
//!   key init | show | clear          - current encryption key
//!   phrase new | restore | show      - recovery phrase backup and restore
//!
//! Payloads:
//!   encrypt [--json] [<text>]        - seal text (or stdin) into a base64 envelope
//!   decrypt [--json] [<envelope>]    - open a base64 envelope
//!   fetch <target> [-X] [-d] [-H]    - HTTP call through the interception layer
//!
//!   config show                      - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use shroud_core::config::{expand_home, ShroudConfig};
use shroud_crypto::{
    decrypt_json, decrypt_text, encrypt_json, encrypt_text, ensure_supported, KdfParams,
    RecoveryPhrase,
};
use shroud_fetch::{EncryptedClient, Method, ReqwestTransport, RequestOptions};
use shroud_keystore::{open_store, KeyStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "shroud",
    version,
    about = "Client-side payload encryption",
    long_about = "shroud: manage the local encryption key and recovery phrase, \
                  seal and open payloads, and make HTTP calls with transparent encryption"
)]
struct Cli {
    /// Path to shroud.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SHROUD_CONFIG",
        default_value = "~/.config/shroud/shroud.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "SHROUD_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "SHROUD_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// `fetch` sends and receives plaintext regardless of [intercept] enabled
    #[arg(long)]
    no_encryption: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encryption key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Recovery phrase management
    Phrase {
        #[command(subcommand)]
        action: PhraseAction,
    },

    /// Encrypt text into a base64 envelope
    Encrypt {
        /// Plaintext (read from stdin when omitted)
        text: Option<String>,
        /// Treat the input as a JSON document
        #[arg(long)]
        json: bool,
        /// Print the {"encrypted": true, "data": ...} transport form
        #[arg(long)]
        wrap: bool,
    },

    /// Decrypt a base64 envelope
    Decrypt {
        /// Envelope (read from stdin when omitted)
        envelope: Option<String>,
        /// Parse the plaintext as JSON and pretty-print it
        #[arg(long)]
        json: bool,
    },

    /// Make an HTTP call with transparent request/response encryption
    Fetch {
        /// Absolute URL, or a path resolved against [transport] base_url
        target: String,
        /// HTTP method (default: GET, or POST when a body is given)
        #[arg(long, short = 'X')]
        method: Option<String>,
        /// Request body
        #[arg(long, short = 'd')]
        data: Option<String>,
        /// Extra header, e.g. -H 'Authorization: Bearer x'
        #[arg(long = "header", short = 'H')]
        headers: Vec<String>,
        /// Print the status line and response headers before the body
        #[arg(long, short = 'i')]
        include: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Create a key if none exists
    Init,
    /// Print the current key (base64). Anyone holding it can read your data.
    Show,
    /// Delete the current key and its recovery phrase
    Clear {
        /// Required: data sealed under the key becomes unreadable
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PhraseAction {
    /// Start a new key from a fresh recovery phrase and print the phrase once
    New {
        /// Replace an existing key
        #[arg(long)]
        force: bool,
    },
    /// Re-derive the key from a recovery phrase (prompted when omitted)
    Restore {
        words: Vec<String>,
    },
    /// Print the stored recovery phrase
    Show,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_home(&cli.config);
    let config = load_config(&config_path)?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(level, &format);
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "shroud starting"
    );

    match cli.command {
        Commands::Key { action } => {
            let keys = open_key_store(&config)?;
            match action {
                KeyAction::Init => cmd_key_init(&keys),
                KeyAction::Show => cmd_key_show(&keys),
                KeyAction::Clear { yes } => cmd_key_clear(&keys, yes),
            }
        }
        Commands::Phrase { action } => {
            let keys = open_key_store(&config)?;
            match action {
                PhraseAction::New { force } => cmd_phrase_new(&keys, force),
                PhraseAction::Restore { words } => cmd_phrase_restore(&keys, &words),
                PhraseAction::Show => cmd_phrase_show(&keys),
            }
        }
        Commands::Encrypt { text, json, wrap } => {
            cmd_encrypt(&open_key_store(&config)?, text, json, wrap)
        }
        Commands::Decrypt { envelope, json } => {
            cmd_decrypt(&open_key_store(&config)?, envelope, json)
        }
        Commands::Fetch {
            target,
            method,
            data,
            headers,
            include,
        } => {
            let request = build_request(method.as_deref(), data, &headers)?;
            let encrypt = config.intercept.enabled && !cli.no_encryption;
            cmd_fetch(&config, &target, request, encrypt, include).await
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

// ── Setup ─────────────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<ShroudConfig> {
    ShroudConfig::load(path).with_context(|| format!("loading config: {}", path.display()))
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Every command that touches keys or payloads comes through here, so an
/// unusable host is reported before any key is generated or read.
fn open_key_store(config: &ShroudConfig) -> Result<KeyStore> {
    ensure_supported().context("crypto primitives unavailable on this host")?;
    let backend = open_store(&config.keystore).with_context(|| {
        format!("opening {:?} key store", config.keystore.backend)
    })?;
    Ok(KeyStore::new(backend).with_kdf_params(KdfParams {
        iterations: config.kdf.iterations,
    }))
}

/// The argument if given, otherwise all of stdin with the trailing newline
/// removed.
fn arg_or_stdin(arg: Option<String>) -> Result<String> {
    if let Some(value) = arg {
        return Ok(value);
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading stdin")?;
    let trimmed = input.strip_suffix('\n').unwrap_or(&input);
    Ok(trimmed.strip_suffix('\r').unwrap_or(trimmed).to_string())
}

// ── `shroud key` ──────────────────────────────────────────────────────────────

fn cmd_key_init(keys: &KeyStore) -> Result<()> {
    if keys.has_key().context("reading key store")? {
        println!("Encryption key already present");
        return Ok(());
    }
    keys.get_or_create_key().context("creating encryption key")?;
    println!("Created a new encryption key");
    println!("  It has no recovery phrase. Use `shroud phrase new` instead for a recoverable key.");
    Ok(())
}

fn cmd_key_show(keys: &KeyStore) -> Result<()> {
    if !keys.has_key().context("reading key store")? {
        anyhow::bail!("no encryption key (run `shroud key init` or `shroud phrase new`)");
    }
    let encoded = keys.get_or_create_key().context("reading encryption key")?;
    println!("{encoded}");
    Ok(())
}

fn cmd_key_clear(keys: &KeyStore, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!(
            "refusing to delete the encryption key without --yes\n\
             Data sealed under it cannot be read again unless you have its recovery phrase."
        );
    }
    keys.clear_key().context("clearing encryption key")?;
    println!("Encryption key and recovery phrase deleted");
    Ok(())
}

// ── `shroud phrase` ───────────────────────────────────────────────────────────

fn cmd_phrase_new(keys: &KeyStore, force: bool) -> Result<()> {
    if keys.has_key().context("reading key store")? && !force {
        anyhow::bail!(
            "an encryption key already exists; pass --force to replace it\n\
             Data sealed under the current key will become unreadable."
        );
    }
    let phrase = keys
        .initialize_with_phrase()
        .context("creating key from recovery phrase")?;

    println!("Recovery phrase (write it down; it will not be shown again unless stored):");
    println!();
    for (i, word) in phrase.words().enumerate() {
        println!("  {:>2}. {word}", i + 1);
    }
    println!();
    println!("Anyone holding these words can recreate your key.");
    Ok(())
}

fn cmd_phrase_restore(keys: &KeyStore, words: &[String]) -> Result<()> {
    let input = if words.is_empty() {
        rpassword::prompt_password("Recovery phrase: ").context("reading recovery phrase")?
    } else {
        words.join(" ")
    };
    let phrase: RecoveryPhrase = input.parse().context("invalid recovery phrase")?;

    keys.restore_from_phrase(&phrase)
        .context("restoring key from recovery phrase")?;
    println!("Encryption key restored from recovery phrase");
    Ok(())
}

fn cmd_phrase_show(keys: &KeyStore) -> Result<()> {
    match keys.get_seed_phrase().context("reading recovery phrase")? {
        Some(phrase) => println!("{}", phrase.expose()),
        None => anyhow::bail!("no recovery phrase stored (the current key was not made from one)"),
    }
    Ok(())
}

// ── `shroud encrypt` / `shroud decrypt` ───────────────────────────────────────

fn cmd_encrypt(keys: &KeyStore, text: Option<String>, json: bool, wrap: bool) -> Result<()> {
    let key = keys.current_key().context("resolving encryption key")?;
    let input = arg_or_stdin(text)?;

    let data = if json {
        let value: serde_json::Value =
            serde_json::from_str(&input).context("input is not valid JSON")?;
        encrypt_json(&value, &key)?
    } else {
        encrypt_text(&input, &key)?
    };

    if wrap {
        println!("{}", shroud_crypto::EncryptedMessage::new(data).to_json()?);
    } else {
        println!("{data}");
    }
    Ok(())
}

fn cmd_decrypt(keys: &KeyStore, envelope: Option<String>, json: bool) -> Result<()> {
    let key = keys.current_key().context("resolving encryption key")?;
    let input = arg_or_stdin(envelope)?;

    // Accept the transport form as well as a bare envelope
    let data = match serde_json::from_str::<serde_json::Value>(&input) {
        Ok(value) => match shroud_crypto::classify(&value)? {
            shroud_crypto::Payload::Encrypted(data) => data.to_string(),
            shroud_crypto::Payload::Plain => input.trim().to_string(),
        },
        Err(_) => input.trim().to_string(),
    };

    if json {
        let value: serde_json::Value = decrypt_json(&data, &key)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", decrypt_text(&data, &key)?);
    }
    Ok(())
}

// ── `shroud fetch` ────────────────────────────────────────────────────────────

fn build_request(method: Option<&str>, data: Option<String>, headers: &[String]) -> Result<RequestOptions> {
    let method = match method {
        Some(m) => m
            .to_ascii_uppercase()
            .parse::<Method>()
            .with_context(|| format!("invalid HTTP method: {m}"))?,
        None if data.is_some() => Method::POST,
        None => Method::GET,
    };

    let mut request = RequestOptions::new(method);
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("header must look like 'Name: value', got {header:?}"))?;
        request = request.try_header(name, value)?;
    }
    if let Some(body) = data {
        request = request.body(body);
    }
    Ok(request)
}

async fn cmd_fetch(
    config: &ShroudConfig,
    target: &str,
    request: RequestOptions,
    encrypt: bool,
    include: bool,
) -> Result<()> {
    let transport = ReqwestTransport::from_config(&config.transport)
        .context("building HTTP transport")?;
    let keys = open_key_store(config)?;
    let client = EncryptedClient::new(transport, keys)
        .context("initializing encryption")?
        .with_encryption(encrypt);

    let response = client
        .call(target, request)
        .await
        .with_context(|| format!("fetch {target}"))?;

    if include {
        println!("{} {}", response.status().as_u16(), response.status_text());
        for (name, value) in response.headers() {
            println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
        }
        println!();
    }
    if response.is_json() {
        match response.json::<serde_json::Value>() {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(_) => println!("{}", response.text()),
        }
    } else {
        print!("{}", response.text());
    }
    Ok(())
}

// ── `shroud config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &ShroudConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_open_key_store_checks_host_then_opens_backend() {
        let mut config = ShroudConfig::default();
        config.keystore.backend = shroud_core::config::KeyStoreBackend::Memory;
        config.kdf.iterations = 1_000;

        let keys = open_key_store(&config).unwrap();
        let phrase = keys.initialize_with_phrase().unwrap();
        let sealed = encrypt_text("hello", &keys.current_key().unwrap()).unwrap();

        assert_eq!(decrypt_text(&sealed, &keys.current_key().unwrap()).unwrap(), "hello");
        assert_eq!(keys.get_seed_phrase().unwrap().unwrap().expose(), phrase.expose());
    }

    #[test]
    fn test_build_request_defaults_method_from_body() {
        assert_eq!(build_request(None, None, &[]).unwrap().method, Method::GET);
        assert_eq!(
            build_request(None, Some("{}".into()), &[]).unwrap().method,
            Method::POST
        );
        assert_eq!(
            build_request(Some("put"), None, &[]).unwrap().method,
            Method::PUT
        );
    }

    #[test]
    fn test_build_request_headers() {
        let request = build_request(
            None,
            None,
            &["Authorization: Bearer abc".to_string(), "X-Id:7".to_string()],
        )
        .unwrap();
        assert_eq!(request.headers["authorization"], "Bearer abc");
        assert_eq!(request.headers["x-id"], "7");

        assert!(build_request(None, None, &["no-colon".to_string()]).is_err());
    }

    #[test]
    fn test_parse_fetch_args() {
        let cli = Cli::try_parse_from([
            "shroud", "--no-encryption", "fetch", "/api/x", "-X", "PATCH", "-d", "{}", "-H", "A: b",
        ])
        .unwrap();
        assert!(cli.no_encryption);
        match cli.command {
            Commands::Fetch { target, method, data, headers, .. } => {
                assert_eq!(target, "/api/x");
                assert_eq!(method.as_deref(), Some("PATCH"));
                assert_eq!(data.as_deref(), Some("{}"));
                assert_eq!(headers, vec!["A: b".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
