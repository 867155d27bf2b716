//! Cryptographic operations module.
//!
//! Key pairs are generated here and nowhere else. The random source is a
//! parameter so tests can run key generation against a seeded generator;
//! production entry points always use the operating system's CSPRNG.
//!
//! # Example
//!
//! ```rust
//! use icert::crypto::keygen::{generate_keypair, KeyAlgorithm};
//!
//! # fn example() -> icert::error::Result<()> {
//! let keypair = generate_keypair(KeyAlgorithm::Ed25519)?;
//! let pem = keypair.private_key_pem()?;
//! assert!(pem.contains("BEGIN PRIVATE KEY"));
//! # Ok(())
//! # }
//! ```

pub mod keygen;
