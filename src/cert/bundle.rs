//! Issued certificate bundles.
//!
//! The last two pipeline stages shared by CA and endpoint issuance: PEM
//! encoding and writing to disk.

use crate::cert::inspect::{inspect_der, CertificateSummary};
use crate::crypto::keygen::KeyPair;
use crate::error::Result;
use crate::storage::pem_files::{write_pem_files, PemLayout};

/// A signed certificate together with its private key, as written to disk.
pub struct IssuedCertificate {
    /// DER encoding of the certificate.
    pub cert_der: Vec<u8>,

    /// `CERTIFICATE` PEM block.
    pub cert_pem: String,

    /// Private key PEM block.
    pub key_pem: String,

    /// Where the blocks were written.
    pub layout: PemLayout,
}

impl IssuedCertificate {
    /// Decode the certificate's subject, issuer, validity and extensions.
    pub fn summary(&self) -> Result<CertificateSummary> {
        inspect_der(&self.cert_der)
    }
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("cert_pem", &self.cert_pem)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Encode a signed certificate and its key, then write them per `layout`.
pub(crate) fn encode_and_write(
    cert: rcgen::Certificate,
    key: &KeyPair,
    layout: &PemLayout,
) -> Result<IssuedCertificate> {
    let cert_pem = cert.pem();
    let key_pem = key.private_key_pem()?;

    write_pem_files(layout, &cert_pem, &key_pem)?;

    Ok(IssuedCertificate {
        cert_der: cert.der().to_vec(),
        cert_pem,
        key_pem,
        layout: layout.clone(),
    })
}
