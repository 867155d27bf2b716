//! Root CA certificate operations.
//!
//! This module provides functions for creating self-signed CA certificates
//! and writing them, with their private key, to PEM files.

use crate::cert::builder::{base_params, SubjectName};
use crate::cert::bundle::{encode_and_write, IssuedCertificate};
use crate::crypto::keygen::{generate_keypair_with_rng, KeyAlgorithm};
use crate::error::{IcertError, Result};
use crate::storage::pem_files::PemLayout;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rcgen::{BasicConstraints, IsCa, KeyUsagePurpose};
use std::time::Duration;

/// Parameters of a CA certificate.
#[derive(Debug, Clone)]
pub struct CaRequest {
    pub algorithm: KeyAlgorithm,
    pub subject: SubjectName,
    pub ttl: Duration,
}

impl CaRequest {
    pub fn new(algorithm: KeyAlgorithm, subject: SubjectName, ttl: Duration) -> Self {
        Self {
            algorithm,
            subject,
            ttl,
        }
    }
}

/// Create a self-signed CA certificate and write it with its private key.
///
/// # Example
///
/// ```rust,no_run
/// use icert::cert::builder::SubjectName;
/// use icert::cert::ca::{generate_ca_certificate, CaRequest};
/// use icert::crypto::keygen::KeyAlgorithm;
/// use icert::storage::pem_files::PemLayout;
/// use std::time::Duration;
///
/// # fn example() -> icert::error::Result<()> {
/// let request = CaRequest::new(
///     KeyAlgorithm::Ed25519,
///     SubjectName::new().organization("Test CA"),
///     Duration::from_secs(3600),
/// );
/// let issued = generate_ca_certificate(&request, &PemLayout::combined("ca.pem"))?;
/// assert!(issued.cert_pem.contains("BEGIN CERTIFICATE"));
/// # Ok(())
/// # }
/// ```
pub fn generate_ca_certificate(
    request: &CaRequest,
    output: &PemLayout,
) -> Result<IssuedCertificate> {
    generate_ca_certificate_with_rng(&mut OsRng, request, output)
}

/// Same as [`generate_ca_certificate`], drawing key material and the serial
/// number from `rng`.
pub fn generate_ca_certificate_with_rng<R>(
    rng: &mut R,
    request: &CaRequest,
    output: &PemLayout,
) -> Result<IssuedCertificate>
where
    R: RngCore + CryptoRng,
{
    let mut params = base_params(rng, &request.subject, request.ttl)?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
    ];

    let serial = params
        .serial_number
        .as_ref()
        .map(|serial| hex::encode(serial.to_bytes()))
        .unwrap_or_default();

    let keypair = generate_keypair_with_rng(rng, request.algorithm)?;

    tracing::debug!(algorithm = %request.algorithm, "self-signing CA certificate");
    let cert = params
        .self_signed(keypair.signer())
        .map_err(|e| IcertError::SigningFailed(format!("Failed to self-sign CA: {}", e)))?;

    let issued = encode_and_write(cert, &keypair, output)?;

    tracing::info!(
        algorithm = %request.algorithm,
        serial = %serial,
        cert = %output.cert_path().display(),
        key = %output.key_path().display(),
        "issued CA certificate"
    );

    Ok(issued)
}
