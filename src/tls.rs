// src/tls.rs
// TLS material: PEM certificate/key files or a generated self-signed pair

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Host name covered by the generated certificate.
const SELF_SIGNED_HOST: &str = "localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsSource {
    Files { cert: PathBuf, key: PathBuf },
    SelfSigned,
}

#[derive(Debug)]
pub enum TlsError {
    IoError(io::Error),
    InvalidCertificate(String),
    InvalidPrivateKey(String),
    MissingPrivateKey,
    MissingCertificate,
    Generation(String),
    ConfigError(String),
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::IoError(e) => write!(f, "IO error: {}", e),
            TlsError::InvalidCertificate(msg) => write!(f, "Invalid certificate: {}", msg),
            TlsError::InvalidPrivateKey(msg) => write!(f, "Invalid private key: {}", msg),
            TlsError::MissingPrivateKey => {
                write!(f, "A certificate was given without a private key (--key)")
            }
            TlsError::MissingCertificate => {
                write!(f, "A private key was given without a certificate (--cert)")
            }
            TlsError::Generation(msg) => {
                write!(f, "Could not generate self-signed certificate: {}", msg)
            }
            TlsError::ConfigError(msg) => write!(f, "TLS configuration error: {}", msg),
        }
    }
}

impl std::error::Error for TlsError {}

impl From<io::Error> for TlsError {
    fn from(err: io::Error) -> Self {
        TlsError::IoError(err)
    }
}

impl From<rustls::Error> for TlsError {
    fn from(err: rustls::Error) -> Self {
        TlsError::ConfigError(format!("Rustls error: {}", err))
    }
}

/// Pick the certificate source for the given flags.
///
/// `Ok(None)` means plain HTTP. With TLS on, `cert` and `key` must come as a
/// pair; when neither is set a certificate is generated at startup.
pub fn validate_ssl_args(
    ssl: bool,
    cert: Option<&Path>,
    key: Option<&Path>,
) -> Result<Option<TlsSource>, TlsError> {
    if !ssl {
        return Ok(None);
    }

    match (cert, key) {
        (Some(cert), Some(key)) => Ok(Some(TlsSource::Files {
            cert: cert.to_path_buf(),
            key: key.to_path_buf(),
        })),
        (Some(_), None) => Err(TlsError::MissingPrivateKey),
        (None, Some(_)) => Err(TlsError::MissingCertificate),
        (None, None) => Ok(Some(TlsSource::SelfSigned)),
    }
}

impl TlsSource {
    /// Build the rustls server configuration for this source.
    pub fn load_server_config(&self) -> Result<ServerConfig, TlsError> {
        let (cert_chain, private_key) = match self {
            TlsSource::Files { cert, key } => (load_certificates(cert)?, load_private_key(key)?),
            TlsSource::SelfSigned => generate_self_signed()?,
        };

        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)?;

        Ok(config)
    }

    pub fn describe(&self) -> String {
        match self {
            TlsSource::Files { cert, .. } => format!("certificate {}", cert.display()),
            TlsSource::SelfSigned => "self-signed certificate".to_string(),
        }
    }
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = BufReader::new(File::open(path)?);
    let cert_chain = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::InvalidCertificate(format!("Failed to parse certificates: {}", e)))?;

    if cert_chain.is_empty() {
        return Err(TlsError::InvalidCertificate(format!(
            "No certificates found in {}",
            path.display()
        )));
    }

    Ok(cert_chain)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = BufReader::new(File::open(path)?);
    private_key(&mut reader)
        .map_err(|e| TlsError::InvalidPrivateKey(format!("Failed to parse private key: {}", e)))?
        .ok_or_else(|| {
            TlsError::InvalidPrivateKey(format!("No private key found in {}", path.display()))
        })
}

fn generate_self_signed() -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), TlsError>
{
    let cert = rcgen::generate_simple_self_signed(vec![SELF_SIGNED_HOST.to_string()])
        .map_err(|e| TlsError::Generation(e.to_string()))?;
    let cert_der = cert
        .serialize_der()
        .map_err(|e| TlsError::Generation(e.to_string()))?;

    let cert_der = CertificateDer::from(cert_der);
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));

    Ok((vec![cert_der], key_der))
}
