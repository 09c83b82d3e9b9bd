//! TLS connector construction.
//!
//! Admin consoles commonly run with self-signed certificates, so besides the
//! usual native-root verification an explicit "accept any certificate" mode
//! is available. The handshake signatures are still checked in that mode.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Build a connector that verifies against the platform root store, or one
/// that accepts any server certificate when `verify_certificates` is false.
pub fn build_connector(verify_certificates: bool) -> Result<TlsConnector, ApiError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ApiError::connection(format!("TLS configuration failed: {}", e)))?;

    let config = if verify_certificates {
        builder
            .with_root_certificates(native_roots()?)
            .with_no_client_auth()
    } else {
        warn!("TLS certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

fn native_roots() -> Result<RootCertStore, ApiError> {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs()
        .map_err(|e| ApiError::connection_io("Cannot load native root certificates", e))?;
    let (added, ignored) = roots.add_parsable_certificates(certs);
    debug!("Loaded {} native certs, ignored {}", added, ignored);
    if roots.is_empty() {
        warn!("Root certificate store is empty; TLS handshakes will fail");
    }
    Ok(roots)
}

/// Convert a host name or IP literal into a TLS server name.
pub fn server_name(hostname: &str) -> Result<ServerName<'static>, ApiError> {
    ServerName::try_from(hostname.to_string())
        .map_err(|_| ApiError::connection(format!("Invalid server name: {}", hostname)))
}

#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
