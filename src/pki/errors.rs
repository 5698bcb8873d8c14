use thiserror::Error;

use crate::asn1::Asn1Error;
use crate::crypto;

/// Reasons a verification could not be decided.
///
/// A signature that simply does not verify is reported as `Ok(false)`, never
/// through this type.
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("No trusted certificates available")]
    NoTrustedCerts,

    #[error("Unknown signature algorithm: {0}")]
    UnknownSignatureAlgorithm(String),

    #[error("Unknown digest algorithm: {0}")]
    UnknownDigestAlgorithm(String),

    #[error("Issuer certificate not found: {0}")]
    IssuerNotFound(String),

    #[error("Issuer certificate is outside its validity period: {0}")]
    IssuerOutOfValidity(String),

    #[error("Signer certificate not found: {0}")]
    SignerNotFound(String),

    #[error("Unsupported public key algorithm: {0}")]
    UnsupportedPublicKey(String),

    #[error(transparent)]
    Encoding(#[from] Asn1Error),

    #[error(transparent)]
    Crypto(#[from] crypto::Error),

    #[error("Base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Error type for trust store operations.
#[derive(Error, Debug)]
pub enum TrustStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory traversal failed: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Certificate decoding failed: {0}")]
    Encoding(#[from] Asn1Error),
}
