//! # Device Pairing CLI
//!
//! Command-line tool driving the pairing sequence of one device:
//! - Register the device and obtain its credentials secret
//! - Resolve the MQTT broker
//! - Obtain and verify a client certificate
//! - Generate device ids
//!
//! ## Usage
//!
//! ```bash
//! # Full pairing run, writing key.pem and cert.pem
//! pairing-client --realm myrealm --device-id 2TBn-jNESuuHamE2Zo1anA pair --token $JWT --out-dir ./creds
//!
//! # Single phases
//! pairing-client register --token $JWT
//! pairing-client broker --secret $SECRET
//! pairing-client verify --secret $SECRET --cert-file ./creds/cert.pem
//!
//! # New device id
//! pairing-client device-id
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use pairing_client::{DeviceId, DeviceKeyMaterial, PairingClient};
use shared::{
    config::PairingConfig,
    types::{CredentialSecret, DeviceCertificate, KeyAlgorithm},
};

const KEY_FILE: &str = "key.pem";
const CERT_FILE: &str = "cert.pem";

#[derive(Parser)]
#[command(name = "pairing-client")]
#[command(about = "Device pairing client: registration, broker lookup and certificate issuance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (.json or .toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Base URL of the pairing service
    #[arg(long, global = true)]
    pairing_url: Option<String>,

    /// Realm of the device
    #[arg(long, global = true)]
    realm: Option<String>,

    /// Device id
    #[arg(long, global = true)]
    device_id: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Key algorithm for the CSR (ecdsa_p256, ecdsa_p384)
    #[arg(long, global = true)]
    key_algorithm: Option<KeyAlgorithm>,

    /// Accept any certificate from the pairing service
    #[arg(long, global = true)]
    insecure: bool,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the device and print its credentials secret
    Register {
        /// Pairing token (defaults to ASTARTE_PAIRING_TOKEN)
        #[arg(long, short = 't')]
        token: Option<String>,
    },

    /// Resolve the MQTT broker URL
    Broker {
        /// Credentials secret from registration
        #[arg(long, short = 's')]
        secret: String,
    },

    /// Generate a key and obtain a client certificate
    Certificate {
        /// Credentials secret from registration
        #[arg(long, short = 's')]
        secret: String,

        /// Directory receiving key.pem and cert.pem (prints the certificate otherwise)
        #[arg(long, short = 'o')]
        out_dir: Option<PathBuf>,
    },

    /// Ask the pairing service whether a certificate is valid
    Verify {
        /// Credentials secret from registration
        #[arg(long, short = 's')]
        secret: String,

        /// PEM certificate to verify
        #[arg(long)]
        cert_file: PathBuf,
    },

    /// Run the full pairing sequence
    Pair {
        /// Pairing token (defaults to ASTARTE_PAIRING_TOKEN)
        #[arg(long, short = 't')]
        token: Option<String>,

        /// Directory receiving key.pem and cert.pem
        #[arg(long, short = 'o')]
        out_dir: Option<PathBuf>,
    },

    /// Generate a device id
    DeviceId {
        /// Namespace UUID for a derived id (random id otherwise)
        #[arg(long, requires = "data")]
        namespace: Option<Uuid>,

        /// Unique hardware data hashed into a derived id
        #[arg(long, requires = "namespace")]
        data: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    if let Commands::DeviceId { namespace, data } = &cli.command {
        let id = match (namespace, data) {
            (Some(namespace), Some(data)) => DeviceId::derive(namespace, data.as_bytes()),
            _ => DeviceId::random(),
        };
        println!("{id}");
        return Ok(());
    }

    let config = load_config(&cli)?;
    info!(
        pairing_url = %config.pairing_url,
        realm = %config.realm,
        device_id = %config.device_id,
        "Configuration loaded"
    );

    let client = PairingClient::from_config(&config)?;

    match cli.command {
        Commands::Register { token } => {
            let token = pairing_token(&config, token)?;
            let secret = client.register(&token, None)?;

            println!("\n✓ Device registered");
            println!("  Credentials secret: {}", secret.expose_secret());
        }
        Commands::Broker { secret } => {
            let broker = client.resolve_broker(&CredentialSecret::new(secret), None)?;
            println!("{broker}");
        }
        Commands::Certificate { secret, out_dir } => {
            let (key, certificate) = client.issue_certificate(&CredentialSecret::new(secret), None)?;

            match out_dir {
                Some(dir) => write_credentials(&dir, &key, &certificate)?,
                None => print!("{certificate}"),
            }
        }
        Commands::Verify { secret, cert_file } => {
            let pem = fs::read_to_string(&cert_file)
                .with_context(|| format!("reading {}", cert_file.display()))?;
            let validity = client.verify_certificate(
                &DeviceCertificate::from_pem(pem),
                &CredentialSecret::new(secret),
                None,
            )?;

            println!("\nCertificate valid: {}", validity.valid);
            if let Some(until) = validity.until {
                println!("  Until: {until}");
            }
            if let Some(cause) = &validity.cause {
                println!("  Cause: {cause}");
            }
            if let Some(details) = &validity.details {
                println!("  Details: {details}");
            }
        }
        Commands::Pair { token, out_dir } => {
            let token = pairing_token(&config, token)?;
            let outcome = client.bootstrap(&token, None)?;
            let identity = outcome.tls_identity()?;

            println!("\n✓ Device paired");
            println!("  Broker: {}", outcome.broker);
            println!("  Credentials secret: {}", outcome.credential_secret.expose_secret());
            println!("  Certificate valid: {}", outcome.validity.valid);
            println!("  Certificate expires: {}", identity.not_after());

            if let Some(dir) = out_dir {
                write_credentials(&dir, &outcome.key_material, &outcome.certificate)?;
            }
        }
        Commands::DeviceId { .. } => {}
    }

    Ok(())
}

/// File, then environment, then command line
fn load_config(cli: &Cli) -> Result<PairingConfig> {
    let mut config = match &cli.config {
        Some(path) => PairingConfig::from_file(path)?,
        None => PairingConfig::default(),
    };
    config.apply_lookup(|name| std::env::var(name).ok())?;

    if let Some(url) = &cli.pairing_url {
        config.pairing_url = url.clone();
    }
    if let Some(realm) = &cli.realm {
        config.realm = realm.clone();
    }
    if let Some(device_id) = &cli.device_id {
        config.device_id = device_id.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    if let Some(algorithm) = cli.key_algorithm {
        config.key_algorithm = algorithm;
    }
    if cli.insecure {
        config.ignore_tls_errors = true;
    }

    config.validate()?;
    Ok(config)
}

fn pairing_token(config: &PairingConfig, flag: Option<String>) -> Result<String> {
    match flag {
        Some(token) => Ok(token),
        None => Ok(config.pairing_token()?.to_string()),
    }
}

fn write_credentials(dir: &Path, key: &DeviceKeyMaterial, certificate: &DeviceCertificate) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let key_path = dir.join(KEY_FILE);
    write_private(&key_path, key.private_key_pem().as_bytes())?;

    let cert_path = dir.join(CERT_FILE);
    fs::write(&cert_path, certificate.as_pem())
        .with_context(|| format!("writing {}", cert_path.display()))?;

    info!(key = %key_path.display(), cert = %cert_path.display(), "Credentials written");
    println!("  Key: {}", key_path.display());
    println!("  Certificate: {}", cert_path.display());

    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("writing {}", path.display()))?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
