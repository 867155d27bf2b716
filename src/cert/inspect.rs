//! Certificate inspection.
//!
//! Decodes an issued certificate back into the handful of fields callers
//! and tests care about.

use crate::crypto::keygen::KeyAlgorithm;
use crate::error::{IcertError, Result};
use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use const_oid::db::rfc5912::RSA_ENCRYPTION;
use const_oid::db::rfc8410::ID_ED_25519;
use const_oid::AssociatedOid;
use der::Decode;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName};
use x509_cert::Certificate;

/// The decoded fields of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial_hex: String,
    /// Unix seconds
    pub not_before: u64,
    /// Unix seconds
    pub not_after: u64,
    pub is_ca: bool,
    pub can_sign_certificates: bool,
    pub server_auth: bool,
    pub client_auth: bool,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub key_algorithm: Option<KeyAlgorithm>,
    pub public_key_hex: String,
}

impl CertificateSummary {
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Summarize a DER-encoded certificate.
pub fn inspect_der(der: &[u8]) -> Result<CertificateSummary> {
    let cert = Certificate::from_der(der)
        .map_err(|e| IcertError::PemError(format!("Failed to decode certificate: {}", e)))?;
    summarize(&cert)
}

/// Summarize the first `CERTIFICATE` block of a PEM string.
///
/// Other blocks, such as a private key in a combined file, are skipped.
pub fn inspect_pem(pem_str: &str) -> Result<CertificateSummary> {
    let blocks = pem::parse_many(pem_str)
        .map_err(|e| IcertError::PemError(format!("Failed to parse PEM: {}", e)))?;

    let block = blocks
        .iter()
        .find(|block| block.tag() == "CERTIFICATE")
        .ok_or_else(|| IcertError::PemError("No CERTIFICATE block found".to_string()))?;

    inspect_der(block.contents())
}

/// Summarize the certificate stored in a PEM file.
pub fn inspect_file(path: &Path) -> Result<CertificateSummary> {
    let pem_str = std::fs::read_to_string(path)?;
    inspect_pem(&pem_str)
}

pub(crate) fn summarize(cert: &Certificate) -> Result<CertificateSummary> {
    let tbs = &cert.tbs_certificate;
    let spki = &tbs.subject_public_key_info;

    let key_algorithm = if spki.algorithm.oid == ID_ED_25519 {
        Some(KeyAlgorithm::Ed25519)
    } else if spki.algorithm.oid == RSA_ENCRYPTION {
        Some(KeyAlgorithm::Rsa)
    } else {
        None
    };

    let mut summary = CertificateSummary {
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        serial_hex: hex::encode(tbs.serial_number.as_bytes()),
        not_before: tbs.validity.not_before.to_unix_duration().as_secs(),
        not_after: tbs.validity.not_after.to_unix_duration().as_secs(),
        is_ca: false,
        can_sign_certificates: false,
        server_auth: false,
        client_auth: false,
        dns_names: Vec::new(),
        ip_addresses: Vec::new(),
        key_algorithm,
        public_key_hex: hex::encode(spki.subject_public_key.raw_bytes()),
    };

    for ext in tbs.extensions.iter().flatten() {
        let value = ext.extn_value.as_bytes();
        let decode_err = |e: der::Error| {
            IcertError::PemError(format!("Invalid extension {}: {}", ext.extn_id, e))
        };

        if ext.extn_id == BasicConstraints::OID {
            summary.is_ca = BasicConstraints::from_der(value).map_err(decode_err)?.ca;
        } else if ext.extn_id == KeyUsage::OID {
            summary.can_sign_certificates =
                KeyUsage::from_der(value).map_err(decode_err)?.key_cert_sign();
        } else if ext.extn_id == ExtendedKeyUsage::OID {
            let eku = ExtendedKeyUsage::from_der(value).map_err(decode_err)?;
            summary.server_auth = eku.0.contains(&ID_KP_SERVER_AUTH);
            summary.client_auth = eku.0.contains(&ID_KP_CLIENT_AUTH);
        } else if ext.extn_id == SubjectAltName::OID {
            let san = SubjectAltName::from_der(value).map_err(decode_err)?;
            for name in san.0 {
                match name {
                    GeneralName::DnsName(dns) => summary.dns_names.push(dns.to_string()),
                    GeneralName::IpAddress(octets) => {
                        summary.ip_addresses.push(ip_from_octets(octets.as_bytes())?)
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(summary)
}

fn ip_from_octets(octets: &[u8]) -> Result<IpAddr> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        return Ok(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        return Ok(IpAddr::V6(Ipv6Addr::from(v6)));
    }
    Err(IcertError::PemError(format!(
        "IP address SAN has invalid length {}",
        octets.len()
    )))
}
