//! Loading of the mutual-TLS material used by the broker connection.

use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// Validated PEM text for the client identity and the trusted CA bundle.
#[derive(Clone)]
pub struct TlsMaterial {
    pub certificate_pem: String,
    pub key_pem: String,
    pub ca_pem: String,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial").finish_non_exhaustive()
    }
}

impl TlsMaterial {
    /// Reads and validates the client certificate chain, its private key and
    /// the CA bundle. Any missing or unparsable file is a fatal [`ConfigError`].
    pub fn load(
        certificate_path: &Path,
        key_path: &Path,
        ca_path: &Path,
    ) -> Result<Self, ConfigError> {
        let certificate_pem = read_pem(certificate_path)?;
        let certificate_count = count_certificates(certificate_path, &certificate_pem)?;

        let key_pem = read_pem(key_path)?;
        match rustls_pemfile::private_key(&mut key_pem.as_bytes()) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(invalid(key_path, "no private key found")),
            Err(e) => return Err(invalid(key_path, e)),
        }

        let ca_pem = read_pem(ca_path)?;
        let ca_count = count_certificates(ca_path, &ca_pem)?;

        tracing::debug!(certificate_count, ca_count, "Loaded broker TLS material");
        Ok(Self {
            certificate_pem,
            key_pem,
            ca_pem,
        })
    }
}

fn read_pem(path: &Path) -> Result<String, ConfigError> {
    let bytes = fs::read(path).map_err(|e| invalid(path, e))?;
    String::from_utf8(bytes).map_err(|_| invalid(path, "file is not valid PEM text"))
}

fn count_certificates(path: &Path, pem: &str) -> Result<usize, ConfigError> {
    let certificates = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(path, e))?;
    if certificates.is_empty() {
        return Err(invalid(path, "no certificates found"));
    }
    Ok(certificates.len())
}

fn invalid(path: &Path, reason: impl ToString) -> ConfigError {
    ConfigError::TlsMaterial {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}
