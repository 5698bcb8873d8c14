use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info, warn};

use super::{CertificateVerifier, VerificationError, verify_signer_info};
use crate::crypto::HashAlg;
use crate::pkcs7::TimestampToken;
use crate::x509::SignedCertificate;

/// Outcome of a timestamp check
#[derive(Debug, Clone)]
pub struct TimestampVerification {
    /// Token signature and embedded certificates verified
    pub signature_verified: bool,
    /// Message imprint equals the digest of the supplied content
    pub imprint_matches: bool,
    pub token: TimestampToken,
}

impl TimestampVerification {
    pub fn is_valid(&self) -> bool {
        self.signature_verified && self.imprint_matches
    }
}

/// Verifies RFC 3161 timestamp tokens against the content they stamp.
#[derive(Debug, Clone, Default)]
pub struct TimestampVerifier {
    verifier: CertificateVerifier,
}

impl TimestampVerifier {
    pub fn new(verifier: CertificateVerifier) -> Self {
        Self { verifier }
    }

    /// Verify a DER timestamp token for `content`.
    ///
    /// Signers and embedded certificates are checked against the embedded
    /// certificates plus `trusted`. An embedded certificate whose issuer is in
    /// neither set fails the whole check.
    pub fn verify(
        &self,
        token_der: &[u8],
        content: &[u8],
        trusted: &[SignedCertificate],
    ) -> Result<TimestampVerification, VerificationError> {
        let token = TimestampToken::from_der(token_der)?;

        let pool: Vec<SignedCertificate> = token
            .certificates()
            .iter()
            .chain(trusted)
            .cloned()
            .collect();

        let mut signature_verified = !token.envelope.signer_infos.is_empty();
        for signer in &token.envelope.signer_infos {
            if !verify_signer_info(signer, &token.envelope.content, &pool)? {
                signature_verified = false;
                break;
            }
        }
        if signature_verified {
            for cert in token.certificates() {
                if !self.verifier.verify_certificate(cert, &pool)? {
                    warn!("Timestamp certificate {} failed verification", cert.id());
                    signature_verified = false;
                    break;
                }
            }
        }

        let imprint = token.msg_imprint();
        let hash_alg = HashAlg::from_oid(&imprint.algorithm.oid).ok_or_else(|| {
            VerificationError::UnknownDigestAlgorithm(imprint.algorithm.name())
        })?;
        let imprint_matches = token.imprint_matches(&hash_alg.hash(content)?);
        if !imprint_matches {
            warn!("Timestamp imprint does not match the {hash_alg} digest of the content");
        }

        info!(
            "Timestamp from {} at {}: signature verified {signature_verified}, imprint matches {imprint_matches}",
            token
                .tsa()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unnamed TSA".to_owned()),
            token.gen_time()
        );
        Ok(TimestampVerification {
            signature_verified,
            imprint_matches,
            token,
        })
    }

    /// Verify a base64 encoded DER timestamp token. Whitespace in the
    /// encoding is ignored.
    pub fn verify_b64(
        &self,
        token_b64: &str,
        content: &[u8],
        trusted: &[SignedCertificate],
    ) -> Result<TimestampVerification, VerificationError> {
        let compact: String = token_b64.split_whitespace().collect();
        let der = STANDARD.decode(compact)?;
        debug!("Decoded {} byte timestamp token", der.len());
        self.verify(&der, content, trusted)
    }
}

/// Verify a DER timestamp token with the default verifier options
pub fn verify_timestamp(
    token_der: &[u8],
    content: &[u8],
    trusted: &[SignedCertificate],
) -> Result<TimestampVerification, VerificationError> {
    TimestampVerifier::default().verify(token_der, content, trusted)
}

/// Verify a base64 encoded timestamp token with the default verifier options
pub fn verify_timestamp_b64(
    token_b64: &str,
    content: &[u8],
    trusted: &[SignedCertificate],
) -> Result<TimestampVerification, VerificationError> {
    TimestampVerifier::default().verify_b64(token_b64, content, trusted)
}
