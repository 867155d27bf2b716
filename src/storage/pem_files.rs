//! PEM file layout and writing.
//!
//! A certificate and its private key are stored either together in one
//! combined file (certificate block first, key block second) or in two
//! separate files. Any file that holds private key material is created
//! readable by its owner only.

use crate::error::{IcertError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Unix mode for files holding a private key.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Unix mode for files holding only a certificate.
pub const PUBLIC_FILE_MODE: u32 = 0o644;

/// Where a certificate and its private key live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PemLayout {
    /// One file: certificate block followed by key block.
    Combined(PathBuf),

    /// Certificate and key in two distinct files.
    Split { cert_path: PathBuf, key_path: PathBuf },
}

impl PemLayout {
    pub fn combined(path: impl Into<PathBuf>) -> Self {
        PemLayout::Combined(path.into())
    }

    /// Two files. Equal paths collapse to [`PemLayout::Combined`].
    pub fn split(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self::from_paths(cert_path, key_path)
    }

    /// Build a layout from a cert/key path pair, treating equal paths as a
    /// combined file.
    ///
    /// # Example
    ///
    /// ```
    /// use icert::storage::pem_files::PemLayout;
    ///
    /// let layout = PemLayout::from_paths("ca.pem", "ca.pem");
    /// assert_eq!(layout, PemLayout::combined("ca.pem"));
    /// ```
    pub fn from_paths(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        let cert_path = cert_path.into();
        let key_path = key_path.into();

        if cert_path == key_path {
            PemLayout::Combined(cert_path)
        } else {
            PemLayout::Split {
                cert_path,
                key_path,
            }
        }
    }

    pub fn cert_path(&self) -> &Path {
        match self {
            PemLayout::Combined(path) => path,
            PemLayout::Split { cert_path, .. } => cert_path,
        }
    }

    pub fn key_path(&self) -> &Path {
        match self {
            PemLayout::Combined(path) => path,
            PemLayout::Split { key_path, .. } => key_path,
        }
    }

    pub fn is_combined(&self) -> bool {
        matches!(self, PemLayout::Combined(_))
    }
}

/// Write a PEM certificate and PEM private key according to `layout`.
///
/// Existing files are truncated. Files are closed before this returns, on
/// success and on error alike. A failure part way through may leave a
/// partially written file behind; callers must discard it.
pub fn write_pem_files(layout: &PemLayout, cert_pem: &str, key_pem: &str) -> Result<()> {
    match layout {
        PemLayout::Split {
            cert_path,
            key_path,
        } if cert_path == key_path => {
            write_pem_files(&PemLayout::Combined(cert_path.clone()), cert_pem, key_pem)
        }
        PemLayout::Combined(path) => {
            let mut contents = String::with_capacity(cert_pem.len() + key_pem.len() + 1);
            contents.push_str(cert_pem);
            if !cert_pem.ends_with('\n') {
                contents.push('\n');
            }
            contents.push_str(key_pem);

            write_file(path, contents.as_bytes(), PRIVATE_FILE_MODE)
        }
        PemLayout::Split {
            cert_path,
            key_path,
        } => {
            write_file(cert_path, cert_pem.as_bytes(), PUBLIC_FILE_MODE)?;
            write_file(key_path, key_pem.as_bytes(), PRIVATE_FILE_MODE)
        }
    }
}

/// Read every file named by `layout`, returning `(cert_bytes, key_bytes)`.
///
/// For a combined layout both halves are the same buffer.
pub fn read_pem_files(
    layout: &PemLayout,
) -> std::result::Result<(Vec<u8>, Vec<u8>), (PathBuf, std::io::Error)> {
    let read = |path: &Path| fs::read(path).map_err(|e| (path.to_path_buf(), e));

    match layout {
        PemLayout::Combined(path) => {
            let contents = read(path)?;
            Ok((contents.clone(), contents))
        }
        PemLayout::Split {
            cert_path,
            key_path,
        } => Ok((read(cert_path)?, read(key_path)?)),
    }
}

fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    tracing::debug!(path = %path.display(), mode = format_args!("{:o}", mode), "writing PEM file");

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options
        .open(path)
        .map_err(|e| IcertError::write_failed(path, e))?;

    // `mode` only applies on creation; a pre-existing file keeps its old bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| IcertError::write_failed(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents)
        .and_then(|_| file.sync_all())
        .map_err(|e| IcertError::write_failed(path, e))
}
