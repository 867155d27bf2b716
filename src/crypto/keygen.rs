//! Key pair generation.
//!
//! This module provides functions for generating Ed25519 and RSA key pairs
//! from a cryptographically secure random source. Every key pair is also
//! converted into an rcgen signer so the same value can be placed in a
//! certificate and used to sign one.

use crate::error::{IcertError, Result};
use const_oid::db::rfc5912::RSA_ENCRYPTION;
use const_oid::db::rfc8410::ID_ED_25519;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, PrivateKeyInfo};
use rsa::RsaPrivateKey;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Modulus size for generated RSA keys.
pub const RSA_KEY_BITS: usize = 2048;

/// The key algorithms a certificate can be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Ed25519,
    Rsa,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
            KeyAlgorithm::Rsa => "rsa",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = IcertError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_lowercase().as_str() {
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            "rsa" => Ok(KeyAlgorithm::Rsa),
            _ => Err(IcertError::UnsupportedAlgorithm(tag.to_string())),
        }
    }
}

enum KeyMaterial {
    Ed25519(SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

/// A freshly generated or freshly loaded key pair.
///
/// The private half is never cached by the library; a `KeyPair` lives only
/// for the duration of one issuance call.
pub struct KeyPair {
    material: KeyMaterial,
    signer: rcgen::KeyPair,
}

impl KeyPair {
    /// Wrap an Ed25519 signing key.
    pub fn from_ed25519(secret: SigningKey) -> Result<Self> {
        let pkcs8 = ed25519_dalek::pkcs8::EncodePrivateKey::to_pkcs8_der(&secret).map_err(|e| {
            IcertError::KeyGenerationFailed(format!("Failed to encode Ed25519 key: {}", e))
        })?;
        let signer = signer_from_pkcs8(pkcs8.as_bytes())?;

        Ok(Self {
            material: KeyMaterial::Ed25519(secret),
            signer,
        })
    }

    /// Wrap an RSA private key.
    pub fn from_rsa(secret: RsaPrivateKey) -> Result<Self> {
        let pkcs8 = secret.to_pkcs8_der().map_err(|e| {
            IcertError::KeyGenerationFailed(format!("Failed to encode RSA key: {}", e))
        })?;
        let signer = signer_from_pkcs8(pkcs8.as_bytes())?;

        Ok(Self {
            material: KeyMaterial::Rsa(Box::new(secret)),
            signer,
        })
    }

    /// Decode a PKCS#8 `PRIVATE KEY` holding either an Ed25519 or an RSA key.
    ///
    /// Malformed bytes are a `PemError`; a well-formed key of any other
    /// algorithm is `UnsupportedAlgorithm`.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| IcertError::PemError(format!("Invalid PKCS#8 private key: {}", e)))?;
        let oid = info.algorithm.oid;

        if oid == ID_ED_25519 {
            let secret =
                <SigningKey as ed25519_dalek::pkcs8::DecodePrivateKey>::from_pkcs8_der(der)
                    .map_err(|e| {
                        IcertError::PemError(format!("Invalid Ed25519 private key: {}", e))
                    })?;
            Self::from_ed25519(secret)
        } else if oid == RSA_ENCRYPTION {
            let secret = RsaPrivateKey::from_pkcs8_der(der)
                .map_err(|e| IcertError::PemError(format!("Invalid RSA private key: {}", e)))?;
            Self::from_rsa(secret)
        } else {
            Err(IcertError::UnsupportedAlgorithm(format!("PKCS#8 key algorithm {}", oid)))
        }
    }

    /// Decode a PKCS#1 `RSA PRIVATE KEY`.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let secret = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| IcertError::PemError(format!("Invalid PKCS#1 RSA key: {}", e)))?;
        Self::from_rsa(secret)
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self.material {
            KeyMaterial::Ed25519(_) => KeyAlgorithm::Ed25519,
            KeyMaterial::Rsa(_) => KeyAlgorithm::Rsa,
        }
    }

    /// The public key as it appears inside a certificate's
    /// `subjectPublicKey` bit string: 32 raw bytes for Ed25519, a DER
    /// `RSAPublicKey` for RSA.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>> {
        match &self.material {
            KeyMaterial::Ed25519(secret) => Ok(secret.verifying_key().to_bytes().to_vec()),
            KeyMaterial::Rsa(secret) => secret
                .to_public_key()
                .to_pkcs1_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| {
                    IcertError::EncodingFailed(format!("Failed to encode RSA public key: {}", e))
                }),
        }
    }

    /// Encode the private key as PEM.
    ///
    /// Ed25519 keys use the PKCS#8 `PRIVATE KEY` block, RSA keys the PKCS#1
    /// `RSA PRIVATE KEY` block.
    pub fn private_key_pem(&self) -> Result<String> {
        match &self.material {
            KeyMaterial::Ed25519(_) => Ok(self.signer.serialize_pem()),
            KeyMaterial::Rsa(secret) => secret
                .to_pkcs1_pem(LineEnding::LF)
                .map(|pem| pem.to_string())
                .map_err(|e| {
                    IcertError::EncodingFailed(format!("Failed to encode RSA private key: {}", e))
                }),
        }
    }

    pub(crate) fn signer(&self) -> &rcgen::KeyPair {
        &self.signer
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Generate a new key pair from the operating system's CSPRNG.
///
/// # Example
///
/// ```
/// use icert::crypto::keygen::{generate_keypair, KeyAlgorithm};
///
/// let keypair = generate_keypair(KeyAlgorithm::Ed25519).unwrap();
/// assert_eq!(keypair.public_key_bytes().unwrap().len(), 32);
/// ```
pub fn generate_keypair(algorithm: KeyAlgorithm) -> Result<KeyPair> {
    generate_keypair_with_rng(&mut OsRng, algorithm)
}

/// Generate a new key pair from the supplied CSPRNG.
pub fn generate_keypair_with_rng<R>(rng: &mut R, algorithm: KeyAlgorithm) -> Result<KeyPair>
where
    R: RngCore + CryptoRng,
{
    tracing::debug!(%algorithm, "generating key pair");

    match algorithm {
        KeyAlgorithm::Ed25519 => KeyPair::from_ed25519(SigningKey::generate(rng)),
        KeyAlgorithm::Rsa => {
            let secret = RsaPrivateKey::new(rng, RSA_KEY_BITS).map_err(|e| {
                IcertError::KeyGenerationFailed(format!(
                    "Failed to generate {}-bit RSA key: {}",
                    RSA_KEY_BITS, e
                ))
            })?;
            KeyPair::from_rsa(secret)
        }
    }
}

fn signer_from_pkcs8(der: &[u8]) -> Result<rcgen::KeyPair> {
    rcgen::KeyPair::try_from(der)
        .map_err(|e| IcertError::KeyGenerationFailed(format!("Failed to build signer: {}", e)))
}
