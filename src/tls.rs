//! TLS acceptor loading
//!
//! Reads a PEM certificate chain and private key and builds the acceptor the
//! accept loop wraps plain TCP streams with.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::AppError;

/// Build a TLS acceptor from PEM files
///
/// Fails if either file cannot be read, the chain is empty or no private
/// key is found.
pub fn load_tls(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, AppError> {
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;

    if certs.is_empty() {
        return Err(AppError::Config(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| {
            AppError::Config(format!("no private key found in {}", key_path.display()))
        })?;

    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "chat_relay-{}-{}",
            uuid::Uuid::new_v4(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_cert_file() {
        let result = load_tls(
            Path::new("/nonexistent/server.crt"),
            Path::new("/nonexistent/server.key"),
        );
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn test_empty_cert_chain() {
        let cert = temp_file("server.crt", "not a pem file\n");
        let key = temp_file("server.key", "");

        let result = load_tls(&cert, &key);
        assert!(matches!(result, Err(AppError::Config(_))));

        let _ = std::fs::remove_file(cert);
        let _ = std::fs::remove_file(key);
    }
}
