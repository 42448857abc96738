//! SSL/TLS testing utilities

use tempfile::NamedTempFile;

pub struct SslTestHelper;

impl SslTestHelper {
    /// Generate a self-signed certificate and key, both PEM encoded
    pub fn generate_test_certificate() -> Result<(String, String), Box<dyn std::error::Error>> {
        use rcgen::{Certificate, CertificateParams};

        let mut params = CertificateParams::new(vec!["localhost".to_string()]);
        params.alg = &rcgen::PKCS_ECDSA_P256_SHA256;

        let cert = Certificate::from_params(params)?;
        let cert_pem = cert.serialize_pem()?;
        let key_pem = cert.serialize_private_key_pem();

        Ok((cert_pem, key_pem))
    }

    /// Certificate and key in temporary files, removed on drop
    pub fn create_temp_cert_files(
    ) -> Result<(NamedTempFile, NamedTempFile), Box<dyn std::error::Error>> {
        let (cert_pem, key_pem) = Self::generate_test_certificate()?;

        let mut cert_file = NamedTempFile::new()?;
        std::io::Write::write_all(&mut cert_file, cert_pem.as_bytes())?;

        let mut key_file = NamedTempFile::new()?;
        std::io::Write::write_all(&mut key_file, key_pem.as_bytes())?;

        Ok((cert_file, key_file))
    }
}
