//! Certificate chain and private key served by a webhook listener.

use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;

use ferrogram_core::{IdentityError, IdentityResult};

/// Certificate chain (append-only) and an optional private key.
///
/// Without a key the listener speaks plaintext HTTP.
#[derive(Debug, Default)]
pub struct TlsIdentity {
    chain: Vec<CertificateDer<'static>>,
    key: Option<PrivateKeyDer<'static>>,
}

impl TlsIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Appends certificates, skipping ones already present.
    pub fn append_certificates(&mut self, certs: impl IntoIterator<Item = CertificateDer<'static>>) {
        for cert in certs {
            if !self.chain.contains(&cert) {
                self.chain.push(cert);
            }
        }
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Replaces the private key.
    pub fn set_private_key(&mut self, key: PrivateKeyDer<'static>) {
        self.key = Some(key);
    }

    /// Returns true when `key` is the configured private key.
    pub fn key_matches(&self, key: &PrivateKeyDer<'_>) -> bool {
        self.key
            .as_ref()
            .is_some_and(|own| own.secret_der() == key.secret_der())
    }

    /// Builds the rustls configuration: TLS 1.2 and 1.3, no client
    /// certificates.
    ///
    /// Returns `Ok(None)` when no key is configured.
    pub fn server_config(&self) -> IdentityResult<Option<Arc<ServerConfig>>> {
        let Some(key) = &self.key else {
            return Ok(None);
        };
        if self.chain.is_empty() {
            return Err(IdentityError::InvalidCertificate(
                "no certificate configured for the private key".into(),
            ));
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
            .map_err(|e| IdentityError::InvalidCertificate(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(self.chain.clone(), key.clone_key())
            .map_err(|e| IdentityError::InvalidPrivateKey(e.to_string()))?;

        debug!(certificates = self.chain.len(), "Built TLS server configuration");
        Ok(Some(Arc::new(config)))
    }
}

// =============================================================================
// PEM loading
// =============================================================================

/// Parses every certificate of a PEM document.
pub fn parse_certificates(pem: &[u8]) -> IdentityResult<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| IdentityError::InvalidCertificate(e.to_string()))?;
    if certs.is_empty() {
        return Err(IdentityError::InvalidCertificate(
            "no PEM certificate found".into(),
        ));
    }
    Ok(certs)
}

/// Parses the first private key (PKCS#8, PKCS#1 or SEC1) of a PEM document.
pub fn parse_private_key(pem: &[u8]) -> IdentityResult<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|e| IdentityError::InvalidPrivateKey(e.to_string()))
}

/// Reads a whole PEM file.
pub async fn read_pem_file(path: &Path) -> IdentityResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| IdentityError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// The subject common name of a certificate.
pub fn common_name(cert: &CertificateDer<'_>) -> IdentityResult<String> {
    let (_, parsed) = x509_parser::parse_x509_certificate(cert.as_ref())
        .map_err(|e| IdentityError::InvalidCertificate(e.to_string()))?;
    let cn = parsed
        .subject()
        .iter_common_name()
        .next()
        .ok_or(IdentityError::MissingCommonName)?
        .as_str()
        .map_err(|e| IdentityError::InvalidCertificate(e.to_string()))?;
    if cn.is_empty() {
        return Err(IdentityError::MissingCommonName);
    }
    Ok(cn.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    /// A self-signed certificate and its key, both PEM.
    pub(crate) struct SelfSigned {
        pub cert_pem: String,
        pub key_pem: String,
    }

    pub(crate) fn self_signed(common_name: Option<&str>) -> SelfSigned {
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.distinguished_name = DistinguishedName::new();
        if let Some(cn) = common_name {
            params.distinguished_name.push(DnType::CommonName, cn);
        }
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        SelfSigned {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }
}
