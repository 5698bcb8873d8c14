//! Trust decisions: issuer signatures, revocation, point-in-time validity,
//! signed messages and timestamps.

mod errors;
mod message;
mod pem;
mod report;
mod revocation;
mod signer;
mod timestamp;
mod truststore;
mod validation;
mod verifier;

pub use errors::{TrustStoreError, VerificationError};
pub use message::{MessageVerification, verify_signed_message};
pub use pem::{certificates_from_pem, is_pem};
pub use report::{CertificateReport, TimestampReport, VerificationReport};
pub use revocation::{RevocationCache, RevocationChecker, RevocationRecord};
pub use signer::verify_signer_info;
pub use timestamp::{
    TimestampVerification, TimestampVerifier, verify_timestamp, verify_timestamp_b64,
};
pub use truststore::TrustStore;
pub use validation::{CertificateValidator, CheckName, VerificationCache, VerificationResults};
pub use verifier::{CertificateVerifier, VerifierOptions, verify_certificate};
