//! TLS client configuration for the dial path.
//!
//! Builds a `rustls` client config from the settings: trusted roots from
//! CA files or the system store, an optional client certificate pair for
//! mutual authentication, and an optional verification bypass for
//! self-signed test servers.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::warn;

use crate::config::TlsConfig;
use crate::error::ApiError;

/// Build a connector from the transport-encryption settings.
pub fn connector(config: &TlsConfig) -> Result<TlsConnector, ApiError> {
    let builder = if config.insecure_skip_verify {
        warn!("skipping server certificate verification");
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoVerifier))
    } else {
        ClientConfig::builder().with_root_certificates(root_store(&config.ca_certs)?)
    };

    let client_config = match (&config.client_cert, &config.client_key) {
        (Some(cert_path), Some(key_path)) => {
            let certs = load_certs(cert_path)?;
            let key = load_key(key_path)?;
            builder.with_client_auth_cert(certs, key)?
        }
        _ => builder.with_no_client_auth(),
    };

    Ok(TlsConnector::from(Arc::new(client_config)))
}

/// Assemble the trusted root set: the given CA files, or the system
/// store when none are configured.
fn root_store(ca_certs: &[String]) -> Result<RootCertStore, ApiError> {
    let mut roots = RootCertStore::empty();
    if ca_certs.is_empty() {
        let native = rustls_native_certs::load_native_certs();
        for cert in native.certs {
            if let Err(e) = roots.add(cert) {
                warn!(error = %e, "failed to add native root cert");
            }
        }
        for e in &native.errors {
            warn!(error = %e, "error loading native certs");
        }
        return Ok(roots);
    }
    for path in ca_certs {
        for cert in load_certs(path)? {
            roots.add(cert).map_err(|e| {
                ApiError::InvalidConfig(format!("CA certificate {path}: {e}"))
            })?;
        }
    }
    Ok(roots)
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ApiError> {
    let file = File::open(path)
        .map_err(|e| ApiError::InvalidConfig(format!("failed to read certificate {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    let certs: Result<Vec<_>, _> = rustls_pemfile::certs(&mut reader).collect();
    let certs = certs
        .map_err(|e| ApiError::InvalidConfig(format!("failed to parse certificate {path}: {e}")))?;
    if certs.is_empty() {
        return Err(ApiError::InvalidConfig(format!(
            "no certificates found in {path}"
        )));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, ApiError> {
    let file = File::open(path)
        .map_err(|e| ApiError::InvalidConfig(format!("failed to read key {path}: {e}")))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ApiError::InvalidConfig(format!("failed to parse key {path}: {e}")))?
        .ok_or_else(|| ApiError::InvalidConfig(format!("no private key found in {path}")))
}

mod danger {
    use tokio_rustls::rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use tokio_rustls::rustls::{DigitallySignedStruct, Error, SignatureScheme};

    /// Accepts any server certificate. Only reachable through
    /// `insecure_skip_verify`.
    #[derive(Debug)]
    pub struct NoVerifier;

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ED25519,
            ]
        }
    }
}
