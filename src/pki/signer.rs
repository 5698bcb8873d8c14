use tracing::{debug, warn};

use super::VerificationError;
use crate::asn1::oid;
use crate::crypto::HashAlg;
use crate::crypto::rsa::RsaPublicKey;
use crate::pkcs7::SignerInfo;
use crate::x509::SignedCertificate;

/// Verify one signer of a SignedData envelope.
///
/// The signer certificate is looked up by issuer and serial number among
/// `certificates`. With authenticated attributes, `messageDigest` must equal
/// the digest of `content` and the signature covers the attributes; without
/// them the signature covers `content` itself.
pub fn verify_signer_info(
    signer: &SignerInfo,
    content: &[u8],
    certificates: &[SignedCertificate],
) -> Result<bool, VerificationError> {
    let hash_alg = HashAlg::from_oid(&signer.digest_algorithm.oid)
        .ok_or_else(|| VerificationError::UnknownDigestAlgorithm(signer.digest_algorithm.name()))?;

    let encryption = &signer.encrypt_algorithm.oid;
    if encryption != oid::RSA_ENCRYPTION && HashAlg::for_rsa_signature(encryption).is_none() {
        return Err(VerificationError::UnknownSignatureAlgorithm(
            signer.encrypt_algorithm.name(),
        ));
    }

    let signer_id = signer.signer_id();
    let cert = certificates
        .iter()
        .find(|cert| cert.id() == signer_id)
        .ok_or_else(|| VerificationError::SignerNotFound(signer_id.to_string()))?;
    let components = cert.tbs.pub_key.rsa.as_ref().ok_or_else(|| {
        VerificationError::UnsupportedPublicKey(cert.tbs.pub_key.algorithm.name())
    })?;
    let key = RsaPublicKey::from_components(&components.modulus, &components.exponent)?;

    let content_digest = hash_alg.hash(content)?;
    let signed_digest = match signer.signed_attributes_der() {
        Some(signed_attributes) => {
            match signer.message_digest()? {
                Some(digest) if digest == content_digest => {}
                Some(_) => {
                    warn!("messageDigest of signer {signer_id} does not match the content");
                    return Ok(false);
                }
                None => {
                    warn!("Signer {signer_id} has authenticated attributes without messageDigest");
                    return Ok(false);
                }
            }
            hash_alg.hash(&signed_attributes)?
        }
        None => content_digest,
    };

    let verified = key.verify_digest(&signer.signature, hash_alg, &signed_digest);
    debug!("Signature of signer {signer_id} verified: {verified}");
    Ok(verified)
}
