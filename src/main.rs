//! icert CLI application.
//!
//! This binary provides a command-line interface for issuing a CA certificate
//! and CA-signed endpoint certificates as PEM files.

use clap::{Parser, Subcommand};
use icert::cert::builder::parse_subject;
use icert::cert::ca::{generate_ca_certificate, CaRequest};
use icert::cert::entity::{generate_endpoint_certificate, EndpointRequest};
use icert::cert::inspect::{inspect_file, CertificateSummary};
use icert::crypto::keygen::KeyAlgorithm;
use icert::error::{IcertError, Result};
use icert::storage::pem_files::PemLayout;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "icert")]
#[command(about = "Issue a CA and CA-signed endpoint certificates as PEM files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a self-signed CA certificate
    Ca {
        /// Key algorithm: ed25519 or rsa
        #[arg(long, default_value = "ed25519")]
        algorithm: String,

        /// Certificate subject (e.g., "CN=My CA,O=My Org")
        #[arg(long)]
        subject: String,

        /// Validity in hours
        #[arg(long, default_value = "8760")]
        ttl_hours: u64,

        /// Output certificate file
        #[arg(long)]
        cert: PathBuf,

        /// Output key file (default: appended to the certificate file)
        #[arg(long)]
        key: Option<PathBuf>,
    },

    /// Create an endpoint certificate signed by a CA
    Endpoint {
        /// Key algorithm: ed25519 or rsa
        #[arg(long, default_value = "ed25519")]
        algorithm: String,

        /// Certificate subject (e.g., "O=My Service")
        #[arg(long)]
        subject: String,

        /// DNS subject alternative name (repeatable)
        #[arg(long = "dns")]
        dns_names: Vec<String>,

        /// IP address subject alternative name (repeatable)
        #[arg(long = "ip")]
        ip_addresses: Vec<IpAddr>,

        /// Validity in hours
        #[arg(long, default_value = "720")]
        ttl_hours: u64,

        /// CA certificate file
        #[arg(long)]
        ca_cert: PathBuf,

        /// CA key file (default: read from the CA certificate file)
        #[arg(long)]
        ca_key: Option<PathBuf>,

        /// Output certificate file
        #[arg(long)]
        cert: PathBuf,

        /// Output key file (default: appended to the certificate file)
        #[arg(long)]
        key: Option<PathBuf>,
    },

    /// Print the fields of a certificate
    Show {
        /// Certificate file
        #[arg(long)]
        cert: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ca {
            algorithm,
            subject,
            ttl_hours,
            cert,
            key,
        } => {
            let request = CaRequest::new(
                algorithm.parse()?,
                parse_subject(&subject)?,
                hours(ttl_hours)?,
            );
            let output = layout(cert, key);

            let issued = generate_ca_certificate(&request, &output)?;

            println!("✓ Created CA certificate: {}", output.cert_path().display());
            if !output.is_combined() {
                println!("  Key: {}", output.key_path().display());
            }
            print_summary(&issued.summary()?);

            Ok(())
        }

        Commands::Endpoint {
            algorithm,
            subject,
            dns_names,
            ip_addresses,
            ttl_hours,
            ca_cert,
            ca_key,
            cert,
            key,
        } => {
            let algorithm: KeyAlgorithm = algorithm.parse()?;
            let request =
                EndpointRequest::new(algorithm, parse_subject(&subject)?, hours(ttl_hours)?)
                    .dns_names(dns_names)
                    .ip_addresses(ip_addresses);
            let ca = layout(ca_cert, ca_key);
            let output = layout(cert, key);

            let issued = generate_endpoint_certificate(&request, &ca, &output)?;

            println!(
                "✓ Created endpoint certificate: {}",
                output.cert_path().display()
            );
            if !output.is_combined() {
                println!("  Key: {}", output.key_path().display());
            }
            println!("  Signed by: CA ({})", ca.cert_path().display());
            print_summary(&issued.summary()?);

            Ok(())
        }

        Commands::Show { cert, json } => {
            let summary = inspect_file(&cert)?;

            if json {
                let out = serde_json::to_string_pretty(&summary)
                    .map_err(|e| IcertError::EncodingFailed(e.to_string()))?;
                println!("{}", out);
            } else {
                print_summary(&summary);
            }

            Ok(())
        }
    }
}

fn layout(cert: PathBuf, key: Option<PathBuf>) -> PemLayout {
    match key {
        Some(key) => PemLayout::from_paths(cert, key),
        None => PemLayout::combined(cert),
    }
}

fn hours(ttl_hours: u64) -> Result<Duration> {
    ttl_hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| IcertError::TemplateBuildFailed(format!("TTL too large: {}h", ttl_hours)))
}

fn print_summary(summary: &CertificateSummary) {
    let algorithm = summary
        .key_algorithm
        .map(|alg| alg.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("  Subject:    {}", summary.subject);
    println!("  Issuer:     {}", summary.issuer);
    println!("  Serial:     {}", summary.serial_hex);
    println!("  Not before: {}", format_time(summary.not_before));
    println!("  Not after:  {}", format_time(summary.not_after));
    println!("  Algorithm:  {}", algorithm);
    println!("  CA:         {}", summary.is_ca);

    let mut usages = Vec::new();
    if summary.can_sign_certificates {
        usages.push("keyCertSign");
    }
    if summary.server_auth {
        usages.push("serverAuth");
    }
    if summary.client_auth {
        usages.push("clientAuth");
    }
    if !usages.is_empty() {
        println!("  Usages:     {}", usages.join(", "));
    }

    if !summary.dns_names.is_empty() {
        println!("  DNS names:  {}", summary.dns_names.join(", "));
    }
    if !summary.ip_addresses.is_empty() {
        let ips: Vec<String> = summary.ip_addresses.iter().map(|ip| ip.to_string()).collect();
        println!("  IPs:        {}", ips.join(", "));
    }
}

fn format_time(secs: u64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}
