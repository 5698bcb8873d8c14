use tracing::{info, warn};

use super::{CertificateValidator, VerificationError, verify_signer_info};
use crate::pkcs7::SignedMessage;
use crate::x509::SignedCertificate;

/// Verdicts for a signed message
#[derive(Debug, Clone)]
pub struct MessageVerification {
    /// Every signer's signature over the content verified
    pub message_verified: bool,
    /// Every embedded certificate verified against the trusted pool
    pub certificates_verified: bool,
    pub message: SignedMessage,
}

/// Decode and verify a PKCS#7 signed message.
///
/// Signer certificates are taken from the envelope, then from `trusted`. Each
/// embedded certificate is verified against `trusted` and its outcome recorded
/// in the validator's cache; the first failure stops the loop.
pub fn verify_signed_message(
    der: &[u8],
    trusted: &[SignedCertificate],
    validator: &CertificateValidator,
) -> Result<MessageVerification, VerificationError> {
    let message = SignedMessage::from_der(der)?;

    let pool: Vec<SignedCertificate> = message
        .certificates
        .iter()
        .chain(trusted)
        .cloned()
        .collect();
    let mut message_verified = !message.signer_infos.is_empty();
    for signer in &message.signer_infos {
        if !verify_signer_info(signer, &message.content, &pool)? {
            message_verified = false;
            break;
        }
    }
    if !message_verified {
        warn!("Verification of the signed message failed");
    }

    let mut certificates_verified = !message.certificates.is_empty();
    for cert in &message.certificates {
        if !validator.verify_and_record(cert, trusted)? {
            warn!("Certificate {} is not trusted", cert.id());
            certificates_verified = false;
            break;
        }
    }

    info!(
        "Signed message of {} bytes: message verified {message_verified}, certificates verified {certificates_verified}",
        message.content.len()
    );
    Ok(MessageVerification {
        message_verified,
        certificates_verified,
        message,
    })
}
