//! Certificate issuance module.
//!
//! This module provides X.509 certificate issuance for a single-level
//! hierarchy: a self-signed CA and endpoint certificates signed by it.

pub mod builder;
pub mod bundle;
pub mod ca;
pub mod entity;
pub mod inspect;
pub mod loader;
