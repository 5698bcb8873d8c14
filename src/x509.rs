//! X.509 certificate and CRL model.
//!
//! Certificates keep every field needed to re-encode the tbsCertificate, since
//! that encoding is what the issuer signature is checked against.

mod certificate;
mod crl;
mod extensions;
mod name;
mod time;

pub use certificate::{
    AlgorithmIdentifier, Certificate, CertificateId, PublicKeyInfo, RsaComponents,
    SignedCertificate,
};
pub use crl::{
    CertificateRevocationList, CrlHeader, CrlSerials, RevocationReason, RevokedCertificate,
};
pub use extensions::{
    AuthorityKeyId, BasicConstraints, DistributionPoint, Extension, ExtensionValue, KeyUsage,
    PolicyInformation, PolicyQualifier, ReasonFlags,
};
pub use name::{AttributeValue, Name};
pub use time::{Asn1Time, TimeKind, Validity};

pub(crate) use extensions::general_names;
pub(crate) use name::decode_string;
