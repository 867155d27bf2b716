//! CA loading from PEM files.
//!
//! The CA certificate and private key are read fresh on every endpoint
//! issuance. Loading checks that the certificate is allowed to sign other
//! certificates and that the key actually belongs to it.

use crate::cert::inspect::{summarize, CertificateSummary};
use crate::crypto::keygen::KeyPair;
use crate::error::{IcertError, Result};
use crate::storage::pem_files::{read_pem_files, PemLayout};
use der::Decode;
use rcgen::CertificateParams;
use rustls_pemfile::Item;
use rustls_pki_types::CertificateDer;
use std::io::Cursor;

/// A CA certificate and key ready to sign endpoint certificates.
pub struct LoadedCa {
    pub(crate) issuer: rcgen::Certificate,
    pub(crate) key: KeyPair,
    pub summary: CertificateSummary,
}

impl std::fmt::Debug for LoadedCa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedCa")
            .field("key", &self.key)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

/// Load a CA certificate and its private key.
///
/// With a combined layout both blocks are taken from the one file.
///
/// # Example
///
/// ```rust,no_run
/// use icert::cert::loader::load_ca;
/// use icert::storage::pem_files::PemLayout;
///
/// # fn example() -> icert::error::Result<()> {
/// let ca = load_ca(&PemLayout::combined("ca.pem"))?;
/// println!("CA subject: {}", ca.summary.subject);
/// # Ok(())
/// # }
/// ```
pub fn load_ca(layout: &PemLayout) -> Result<LoadedCa> {
    let (cert_pem, key_pem) = read_pem_files(layout)
        .map_err(|(path, e)| IcertError::ca_load_failed(path, format!("Failed to read: {}", e)))?;

    let cert_path = layout.cert_path();
    let key_path = layout.key_path();

    let cert_der = load_certificate_from_pem(&cert_pem)
        .map_err(|reason| IcertError::ca_load_failed(cert_path, reason))?;
    let key = load_private_key_from_pem(&key_pem)
        .map_err(|reason| IcertError::ca_load_failed(key_path, reason))?;

    let cert = x509_cert::Certificate::from_der(&cert_der).map_err(|e| {
        IcertError::ca_load_failed(cert_path, format!("Failed to decode certificate: {}", e))
    })?;
    let summary =
        summarize(&cert).map_err(|e| IcertError::ca_load_failed(cert_path, e.to_string()))?;

    if !summary.is_ca || !summary.can_sign_certificates {
        return Err(IcertError::ca_load_failed(
            cert_path,
            "Certificate is not a CA with the keyCertSign usage",
        ));
    }

    let public_key = key
        .public_key_bytes()
        .map_err(|e| IcertError::ca_load_failed(key_path, e.to_string()))?;
    if public_key.as_slice()
        != cert
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes()
    {
        return Err(IcertError::ca_load_failed(
            key_path,
            format!(
                "{} private key does not match the CA certificate's public key",
                key.algorithm()
            ),
        ));
    }

    // rcgen signs against a Certificate value; rebuild one from the parsed
    // parameters so the issuer name and key identifier match the file.
    let params = CertificateParams::from_ca_cert_der(&CertificateDer::from(cert_der))
        .map_err(|e| IcertError::ca_load_failed(cert_path, format!("Unusable CA: {}", e)))?;
    let issuer = params
        .self_signed(key.signer())
        .map_err(|e| IcertError::ca_load_failed(cert_path, format!("Unusable CA: {}", e)))?;

    tracing::debug!(
        subject = %summary.subject,
        algorithm = %key.algorithm(),
        "loaded CA"
    );

    Ok(LoadedCa {
        issuer,
        key,
        summary,
    })
}

/// Extract the first certificate from PEM data as DER, skipping any other
/// blocks.
pub fn load_certificate_from_pem(pem: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut cursor = Cursor::new(pem);

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| format!("Failed to read PEM: {}", e))?
        {
            Some(Item::X509Certificate(cert_der)) => return Ok(cert_der.to_vec()),
            Some(_) => continue,
            None => return Err("No CERTIFICATE block found".to_string()),
        }
    }
}

/// Extract the first private key from PEM data, skipping any other blocks.
///
/// Accepts PKCS#8 `PRIVATE KEY` (Ed25519 or RSA) and PKCS#1
/// `RSA PRIVATE KEY`.
pub fn load_private_key_from_pem(pem: &[u8]) -> std::result::Result<KeyPair, String> {
    let mut cursor = Cursor::new(pem);

    loop {
        match rustls_pemfile::read_one(&mut cursor)
            .map_err(|e| format!("Failed to read PEM: {}", e))?
        {
            Some(Item::Pkcs8Key(key)) => {
                return KeyPair::from_pkcs8_der(key.secret_pkcs8_der()).map_err(|e| e.to_string())
            }
            Some(Item::Pkcs1Key(key)) => {
                return KeyPair::from_pkcs1_der(key.secret_pkcs1_der()).map_err(|e| e.to_string())
            }
            Some(Item::Sec1Key(_)) => {
                return Err("EC PRIVATE KEY blocks are not supported".to_string())
            }
            Some(_) => continue,
            None => return Err("No private key block found".to_string()),
        }
    }
}
