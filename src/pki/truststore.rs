use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::TrustStoreError;
use super::pem::{certificates_from_pem, is_pem};
use crate::x509::{CertificateId, Name, SignedCertificate};

const CERT_EXTENSIONS: [&str; 4] = ["pem", "crt", "cer", "der"];

/// In-memory pool of trusted certificates.
///
/// Certificates are keyed by issuer and serial number; adding the same
/// certificate twice keeps one copy. Clones share the same pool.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certs: Arc<DashMap<CertificateId, Arc<SignedCertificate>>>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trust store from every certificate file found under `dir`.
    pub async fn load_dir(dir: impl AsRef<Path>) -> Result<Self, TrustStoreError> {
        let store = Self::new();
        store.add_dir(dir).await?;
        Ok(store)
    }

    /// Walk `dir` and add the certificates of all `.pem`, `.crt`, `.cer` and
    /// `.der` files. Files that cannot be read or decoded are skipped.
    ///
    /// Returns the number of certificates added.
    pub async fn add_dir(&self, dir: impl AsRef<Path>) -> Result<usize, TrustStoreError> {
        let mut count = 0;

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || !has_cert_extension(path) {
                continue;
            }
            match fs::read(path).await {
                Ok(data) => {
                    let added = self.add_bytes(&data);
                    if added == 0 {
                        debug!("No certificate could be read from {}", path.display());
                    }
                    count += added;
                }
                Err(e) => warn!("Failed to read {}: {e}", path.display()),
            }
        }
        info!(
            "Loaded {count} certificates from {}",
            dir.as_ref().display()
        );
        Ok(count)
    }

    /// Add the certificates found in a file buffer, PEM or DER.
    pub fn add_bytes(&self, data: &[u8]) -> usize {
        if is_pem(data) {
            return self.add_pem(&String::from_utf8_lossy(data));
        }
        match self.add_der(data) {
            Ok(_) => 1,
            Err(e) => {
                debug!("Skipping undecodable certificate: {e}");
                0
            }
        }
    }

    pub fn add_der(&self, der: &[u8]) -> Result<CertificateId, TrustStoreError> {
        let cert = SignedCertificate::from_der(der)?;
        Ok(self.add(cert))
    }

    /// Add all decodable certificates of a PEM document
    pub fn add_pem(&self, text: &str) -> usize {
        certificates_from_pem(text)
            .iter()
            .filter(|der| match self.add_der(der) {
                Ok(_) => true,
                Err(e) => {
                    debug!("Skipping undecodable PEM certificate: {e}");
                    false
                }
            })
            .count()
    }

    pub fn add(&self, cert: SignedCertificate) -> CertificateId {
        let id = cert.id();
        self.certs.insert(id.clone(), Arc::new(cert));
        id
    }

    pub fn get(&self, id: &CertificateId) -> Option<Arc<SignedCertificate>> {
        self.certs.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// All certificates whose subject equals `subject`
    pub fn find_by_subject(&self, subject: &Name) -> Vec<Arc<SignedCertificate>> {
        self.certs
            .iter()
            .filter(|entry| entry.value().subject() == subject)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn remove(&self, id: &CertificateId) -> bool {
        self.certs.remove(id).is_some()
    }

    pub fn clear(&self) {
        self.certs.clear();
    }

    /// Copy of the current pool, as handed to the verifier
    pub fn snapshot(&self) -> Vec<SignedCertificate> {
        self.certs
            .iter()
            .map(|entry| entry.value().as_ref().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

fn has_cert_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            CERT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
