//! End-entity certificate operations.
//!
//! This module provides functions for creating endpoint certificates signed
//! by a CA that was previously written to disk.

use crate::cert::builder::{base_params, SubjectName};
use crate::cert::bundle::{encode_and_write, IssuedCertificate};
use crate::cert::loader::load_ca;
use crate::crypto::keygen::{generate_keypair_with_rng, KeyAlgorithm};
use crate::error::{IcertError, Result};
use crate::storage::pem_files::PemLayout;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rcgen::{ExtendedKeyUsagePurpose, Ia5String, IsCa, KeyUsagePurpose, SanType};
use std::net::IpAddr;
use std::time::Duration;
use time::OffsetDateTime;

/// Parameters of an endpoint certificate.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    pub algorithm: KeyAlgorithm,
    pub subject: SubjectName,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub ttl: Duration,
}

impl EndpointRequest {
    pub fn new(algorithm: KeyAlgorithm, subject: SubjectName, ttl: Duration) -> Self {
        Self {
            algorithm,
            subject,
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            ttl,
        }
    }

    pub fn dns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn ip_addresses<I>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        self.ip_addresses.extend(addresses);
        self
    }
}

/// Create an endpoint certificate signed by the CA stored at `ca`.
///
/// The CA certificate and key are loaded from disk on every call. The new
/// certificate's algorithm is independent of the CA's.
///
/// The certificate's lifetime is not clamped to the CA's: a TTL that reaches
/// past the CA's expiry is logged and honored, and relying parties will stop
/// trusting the certificate once the CA expires.
///
/// # Example
///
/// ```rust,no_run
/// use icert::cert::builder::SubjectName;
/// use icert::cert::entity::{generate_endpoint_certificate, EndpointRequest};
/// use icert::crypto::keygen::KeyAlgorithm;
/// use icert::storage::pem_files::PemLayout;
/// use std::time::Duration;
///
/// # fn example() -> icert::error::Result<()> {
/// let request = EndpointRequest::new(
///     KeyAlgorithm::Rsa,
///     SubjectName::new().organization("Test Endpoint"),
///     Duration::from_secs(3600),
/// )
/// .dns_names(["localhost"])
/// .ip_addresses(["127.0.0.1".parse().unwrap()]);
///
/// generate_endpoint_certificate(
///     &request,
///     &PemLayout::combined("ca.pem"),
///     &PemLayout::split("server_cert.pem", "server_key.pem"),
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn generate_endpoint_certificate(
    request: &EndpointRequest,
    ca: &PemLayout,
    output: &PemLayout,
) -> Result<IssuedCertificate> {
    generate_endpoint_certificate_with_rng(&mut OsRng, request, ca, output)
}

/// Same as [`generate_endpoint_certificate`], drawing key material and the
/// serial number from `rng`.
pub fn generate_endpoint_certificate_with_rng<R>(
    rng: &mut R,
    request: &EndpointRequest,
    ca: &PemLayout,
    output: &PemLayout,
) -> Result<IssuedCertificate>
where
    R: RngCore + CryptoRng,
{
    let subject_alt_names = subject_alt_names(&request.dns_names, &request.ip_addresses)?;

    let mut params = base_params(rng, &request.subject, request.ttl)?;
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];
    params.subject_alt_names = subject_alt_names;
    params.use_authority_key_identifier_extension = true;

    let serial = params
        .serial_number
        .as_ref()
        .map(|serial| hex::encode(serial.to_bytes()))
        .unwrap_or_default();

    let ca_cert = load_ca(ca)?;
    warn_if_outlives_ca(params.not_after, ca_cert.summary.not_after, &ca_cert.summary.subject);

    let keypair = generate_keypair_with_rng(rng, request.algorithm)?;

    tracing::debug!(
        algorithm = %request.algorithm,
        ca_algorithm = %ca_cert.key.algorithm(),
        "signing endpoint certificate"
    );
    let cert = params
        .signed_by(keypair.signer(), &ca_cert.issuer, ca_cert.key.signer())
        .map_err(|e| {
            IcertError::SigningFailed(format!("Failed to sign endpoint certificate: {}", e))
        })?;

    let issued = encode_and_write(cert, &keypair, output)?;

    tracing::info!(
        algorithm = %request.algorithm,
        serial = %serial,
        issuer = %ca_cert.summary.subject,
        dns_names = ?request.dns_names,
        ip_addresses = ?request.ip_addresses,
        cert = %output.cert_path().display(),
        key = %output.key_path().display(),
        "issued endpoint certificate"
    );

    Ok(issued)
}

/// Build the subject alternative names, exactly the given DNS names followed
/// by the given IP addresses.
fn subject_alt_names(dns_names: &[String], ip_addresses: &[IpAddr]) -> Result<Vec<SanType>> {
    if dns_names.is_empty() && ip_addresses.is_empty() {
        return Err(IcertError::InvalidSubjectAltNames(
            "At least one DNS name or IP address is required".to_string(),
        ));
    }

    let mut names = Vec::with_capacity(dns_names.len() + ip_addresses.len());

    for dns in dns_names {
        if dns.trim().is_empty() {
            return Err(IcertError::InvalidSubjectAltNames(
                "DNS name cannot be empty".to_string(),
            ));
        }
        let name = Ia5String::try_from(dns.as_str()).map_err(|e| {
            IcertError::InvalidSubjectAltNames(format!("Invalid DNS name {}: {}", dns, e))
        })?;
        names.push(SanType::DnsName(name));
    }

    names.extend(ip_addresses.iter().copied().map(SanType::IpAddress));

    Ok(names)
}

fn warn_if_outlives_ca(not_after: OffsetDateTime, ca_not_after: u64, ca_subject: &str) {
    let not_after = not_after.unix_timestamp();
    if not_after > ca_not_after as i64 {
        tracing::warn!(
            ca = %ca_subject,
            overrun_secs = not_after - ca_not_after as i64,
            "endpoint certificate outlives its CA; it will not validate past the CA's expiry"
        );
    }
}
