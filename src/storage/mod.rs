//! Certificate and key file storage.
//!
//! This module decides where PEM blocks land on disk and with which
//! permissions.

pub mod pem_files;
