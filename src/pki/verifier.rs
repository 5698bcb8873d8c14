use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use super::VerificationError;
use crate::crypto::HashAlg;
use crate::crypto::rsa::RsaPublicKey;
use crate::x509::{AlgorithmIdentifier, CertificateRevocationList, Name, SignedCertificate};

/// Policy switches for certificate verification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct VerifierOptions {
    /// Reject issuers that are outside their own validity period at
    /// verification time
    #[serde(default)]
    pub check_issuer_validity: bool,
}

/// Checks issuer signatures on certificates and CRLs against a pool of
/// trusted certificates.
#[derive(Debug, Clone, Default)]
pub struct CertificateVerifier {
    options: VerifierOptions,
}

impl CertificateVerifier {
    pub fn new(options: VerifierOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> VerifierOptions {
        self.options
    }

    /// Verify the issuer signature of `cert` with a certificate from `trusted`.
    ///
    /// `Ok(false)` means the signature was checked and did not match.
    pub fn verify_certificate(
        &self,
        cert: &SignedCertificate,
        trusted: &[SignedCertificate],
    ) -> Result<bool, VerificationError> {
        self.verify_certificate_at(cert, trusted, Utc::now())
    }

    /// Like [`Self::verify_certificate`], with an explicit clock for the
    /// issuer validity check.
    pub fn verify_certificate_at(
        &self,
        cert: &SignedCertificate,
        trusted: &[SignedCertificate],
        now: DateTime<Utc>,
    ) -> Result<bool, VerificationError> {
        if trusted.is_empty() {
            return Err(VerificationError::NoTrustedCerts);
        }
        // the issuer signed the encoding of the tbsCertificate, rebuilt from the model
        let tbs = cert.tbs.to_der();
        let verified = self.verify_signature(
            &tbs,
            &cert.signature_algorithm,
            &cert.signature,
            cert.issuer(),
            trusted,
            now,
        )?;
        debug!(
            "Signature of certificate {} verified: {verified}",
            cert.id()
        );
        Ok(verified)
    }

    /// Decode a DER certificate and verify it
    pub fn verify_certificate_der(
        &self,
        der: &[u8],
        trusted: &[SignedCertificate],
    ) -> Result<bool, VerificationError> {
        let cert = SignedCertificate::from_der(der)?;
        self.verify_certificate(&cert, trusted)
    }

    /// Verify the issuer signature of a CRL. The signed bytes are the
    /// tbsCertList exactly as received.
    pub fn verify_crl(
        &self,
        crl: &CertificateRevocationList,
        trusted: &[SignedCertificate],
    ) -> Result<bool, VerificationError> {
        if trusted.is_empty() {
            return Err(VerificationError::NoTrustedCerts);
        }
        self.verify_signature(
            crl.tbs_der(),
            &crl.signature_algorithm,
            &crl.signature,
            crl.issuer(),
            trusted,
            Utc::now(),
        )
    }

    fn verify_signature(
        &self,
        signed: &[u8],
        algorithm: &AlgorithmIdentifier,
        signature: &[u8],
        issuer: &Name,
        trusted: &[SignedCertificate],
        now: DateTime<Utc>,
    ) -> Result<bool, VerificationError> {
        let hash_alg = HashAlg::for_rsa_signature(&algorithm.oid)
            .ok_or_else(|| VerificationError::UnknownSignatureAlgorithm(algorithm.name()))?;
        let digest = hash_alg.hash(signed)?;

        let mut candidates: Vec<&SignedCertificate> = trusted
            .iter()
            .filter(|candidate| candidate.subject() == issuer)
            .collect();
        if candidates.is_empty() {
            return Err(VerificationError::IssuerNotFound(issuer.to_string()));
        }

        if self.options.check_issuer_validity {
            candidates.retain(|candidate| candidate.validity().contains(now));
            if candidates.is_empty() {
                return Err(VerificationError::IssuerOutOfValidity(issuer.to_string()));
            }
        }

        // several certificates may share the issuer name, e.g. after a re-key
        let mut rsa_keys = 0;
        let mut key_error = None;
        for candidate in candidates {
            let Some(components) = candidate.tbs.pub_key.rsa.as_ref() else {
                debug!(
                    "Issuer candidate {} has a {} key, skipping",
                    candidate.id(),
                    candidate.tbs.pub_key.algorithm.name()
                );
                continue;
            };
            let key = match RsaPublicKey::from_components(&components.modulus, &components.exponent) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Issuer candidate {} has an unusable RSA key: {e}", candidate.id());
                    key_error = Some(e);
                    continue;
                }
            };
            rsa_keys += 1;
            if key.verify_digest(signature, hash_alg, &digest) {
                return Ok(true);
            }
        }

        if rsa_keys == 0 {
            return Err(match key_error {
                Some(e) => e.into(),
                None => VerificationError::UnsupportedPublicKey(issuer.to_string()),
            });
        }
        warn!("No issuer key named {issuer} matches the {hash_alg} signature");
        Ok(false)
    }
}

/// Verify `cert` with the default options
pub fn verify_certificate(
    cert: &SignedCertificate,
    trusted: &[SignedCertificate],
) -> Result<bool, VerificationError> {
    CertificateVerifier::default().verify_certificate(cert, trusted)
}
