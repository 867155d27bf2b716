//! icert: a self-signed CA and CA-signed endpoint certificates as PEM files
//!
//! This library issues the certificates a local TLS deployment or a test
//! suite needs. It enables users to:
//!
//! - Generate Ed25519 or RSA-2048 keypairs
//! - Create a self-signed CA certificate
//! - Create endpoint certificates for DNS names and IP addresses, signed by
//!   a CA loaded from disk
//! - Write certificate and key to one combined PEM file or to two files
//!
//! # Architecture
//!
//! Issuance is a fixed pipeline of small functions: key generation, template
//! build, signing, PEM encoding and file writing. Each stage maps its
//! failure to its own [`IcertError`] variant. Randomness is injected, so
//! every operation has a `_with_rng` form for reproducible runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use icert::cert::builder::SubjectName;
//! use icert::cert::ca::{generate_ca_certificate, CaRequest};
//! use icert::cert::entity::{generate_endpoint_certificate, EndpointRequest};
//! use icert::crypto::keygen::KeyAlgorithm;
//! use icert::error::Result;
//! use icert::storage::pem_files::PemLayout;
//! use std::time::Duration;
//!
//! fn example() -> Result<()> {
//!     let ca = PemLayout::combined("ca.pem");
//!     let day = Duration::from_secs(24 * 3600);
//!
//!     generate_ca_certificate(
//!         &CaRequest::new(KeyAlgorithm::Ed25519, SubjectName::new().organization("Test CA"), day),
//!         &ca,
//!     )?;
//!
//!     let subject = SubjectName::new().organization("Test");
//!     let request =
//!         EndpointRequest::new(KeyAlgorithm::Rsa, subject, day).dns_names(["localhost"]);
//!     generate_endpoint_certificate(&request, &ca, &PemLayout::split("cert.pem", "key.pem"))?;
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod crypto;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use error::{IcertError, Result};
