use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use super::{CertificateVerifier, RevocationChecker, VerificationError};
use crate::x509::{CertificateId, SignedCertificate};

/// Named checks reported for a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckName {
    SignatureOk,
    CertTimeValidityOk,
    CertNotRevoked,
}

impl CheckName {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckName::SignatureOk => "SIGNATURE_OK",
            CheckName::CertTimeValidityOk => "CERT_TIME_VALIDITY_OK",
            CheckName::CertNotRevoked => "CERT_NOT_REVOKED",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type VerificationResults = BTreeMap<CheckName, bool>;

/// Check outcomes recorded per certificate identity.
///
/// Only decided outcomes are stored; a check that ended in an error leaves
/// no entry behind.
#[derive(Debug, Clone, Default)]
pub struct VerificationCache {
    results: Arc<DashMap<CertificateId, VerificationResults>>,
}

impl VerificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: CertificateId, check: CheckName, passed: bool) {
        self.results.entry(id).or_default().insert(check, passed);
    }

    pub fn results(&self, id: &CertificateId) -> Option<VerificationResults> {
        self.results.get(id).map(|entry| entry.value().clone())
    }

    pub fn forget(&self, id: &CertificateId) -> bool {
        self.results.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Combines signature verification, validity period and revocation status
/// into a verdict for a given date.
#[derive(Debug, Clone, Default)]
pub struct CertificateValidator {
    verifier: CertificateVerifier,
    revocation: RevocationChecker,
    cache: VerificationCache,
}

impl CertificateValidator {
    pub fn new(
        verifier: CertificateVerifier,
        revocation: RevocationChecker,
        cache: VerificationCache,
    ) -> Self {
        Self {
            verifier,
            revocation,
            cache,
        }
    }

    pub fn verifier(&self) -> &CertificateVerifier {
        &self.verifier
    }

    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    /// Verify the certificate signature and record `SIGNATURE_OK`.
    pub fn verify_and_record(
        &self,
        cert: &SignedCertificate,
        trusted: &[SignedCertificate],
    ) -> Result<bool, VerificationError> {
        let verified = self.verifier.verify_certificate(cert, trusted)?;
        self.record_signature(cert, verified);
        Ok(verified)
    }

    pub fn record_signature(&self, cert: &SignedCertificate, verified: bool) {
        self.cache.record(cert.id(), CheckName::SignatureOk, verified);
    }

    /// True when checks were recorded for `cert` and all of them passed
    pub fn is_verified(&self, cert: &SignedCertificate) -> bool {
        self.cache
            .results(&cert.id())
            .is_some_and(|results| results.values().all(|passed| *passed))
    }

    /// Recorded results plus the validity period and revocation checks for
    /// `date`. The date checks are computed on every call and never recorded.
    ///
    /// `None` when the certificate signature was never checked.
    pub fn verification_results_at_date(
        &self,
        cert: &SignedCertificate,
        date: DateTime<Utc>,
    ) -> Option<VerificationResults> {
        let mut results = self.cache.results(&cert.id())?;
        results.insert(
            CheckName::CertTimeValidityOk,
            self.time_validity_at_date(cert, date),
        );
        results.insert(
            CheckName::CertNotRevoked,
            self.revocation_date(cert, date).is_none(),
        );
        Some(results)
    }

    /// Whether every check passes at `date`. A certificate whose signature
    /// was never checked is invalid.
    pub fn valid_at_date(&self, cert: &SignedCertificate, date: DateTime<Utc>) -> bool {
        let valid = self
            .verification_results_at_date(cert, date)
            .is_some_and(|results| results.values().all(|passed| *passed));
        debug!("Certificate {} valid at {date}: {valid}", cert.id());
        valid
    }

    pub fn time_validity_at_date(&self, cert: &SignedCertificate, date: DateTime<Utc>) -> bool {
        cert.validity().contains(date)
    }

    /// Revocation date of `cert` if it was revoked on or before `as_of`
    pub fn revocation_date(
        &self,
        cert: &SignedCertificate,
        as_of: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.revocation
            .is_revoked(cert.issuer(), cert.serial_number(), as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::{Encoder, tag};
    use crate::pki::RevocationCache;
    use crate::x509::Asn1Time;
    use chrono::TimeZone;
    use openssl::asn1::Asn1Time as OpensslTime;
    use openssl::bn::BigNum;
    use openssl::hash::MessageDigest;
    use openssl::pkey::PKey;
    use openssl::rsa::Rsa;
    use openssl::x509::{X509, X509NameBuilder};

    fn self_signed(serial: u32) -> SignedCertificate {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "Validity Test").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&OpensslTime::from_str("20200101000000Z").unwrap())
            .unwrap();
        builder
            .set_not_after(&OpensslTime::from_str("20300101000000Z").unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        SignedCertificate::from_der(&builder.build().to_der().unwrap()).unwrap()
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_never_verified_is_invalid() {
        let cert = self_signed(1);
        let validator = CertificateValidator::default();

        assert!(!validator.is_verified(&cert));
        assert!(validator.verification_results_at_date(&cert, at(2025, 6, 1)).is_none());
        assert!(!validator.valid_at_date(&cert, at(2025, 6, 1)));
    }

    #[test]
    fn test_validity_window() {
        let cert = self_signed(1);
        let validator = CertificateValidator::default();
        assert!(validator.verify_and_record(&cert, &[cert.clone()]).unwrap());

        assert!(validator.valid_at_date(&cert, at(2025, 6, 1)));
        assert!(validator.valid_at_date(&cert, at(2020, 1, 1)));
        assert!(!validator.valid_at_date(&cert, at(2031, 1, 1)));
        assert!(!validator.valid_at_date(&cert, at(2019, 12, 31)));

        let results = validator
            .verification_results_at_date(&cert, at(2031, 1, 1))
            .unwrap();
        assert_eq!(results[&CheckName::SignatureOk], true);
        assert_eq!(results[&CheckName::CertTimeValidityOk], false);
        assert_eq!(results[&CheckName::CertNotRevoked], true);

        // date checks are never recorded
        let cached = validator.cache().results(&cert.id()).unwrap();
        assert_eq!(cached.len(), 1);
        assert!(validator.is_verified(&cert));
    }

    #[test]
    fn test_failed_signature_is_recorded() {
        let cert = self_signed(1);
        let mut tampered = cert.clone();
        tampered.signature[10] ^= 0x01;

        let validator = CertificateValidator::default();
        assert!(!validator.verify_and_record(&tampered, &[cert]).unwrap());
        assert!(!validator.valid_at_date(&tampered, at(2025, 6, 1)));
        assert!(!validator.is_verified(&tampered));
    }

    #[test]
    fn test_errors_are_not_recorded() {
        let cert = self_signed(1);
        let validator = CertificateValidator::default();
        assert!(validator.verify_and_record(&cert, &[]).is_err());
        assert!(validator.cache().is_empty());
    }

    #[test]
    fn test_revoked_after_date() {
        let cert = self_signed(0x4242);
        let mut entries = Encoder::new();
        entries.constructed(tag::SEQUENCE, |entry| {
            entry.small_integer(0x4242);
            Asn1Time::from_datetime(at(2026, 3, 1)).encode(entry);
        });

        let cache = RevocationCache::new();
        cache.insert_revoked_serials(cert.issuer().clone(), entries.finish(), at(2026, 3, 1));
        let validator = CertificateValidator::new(
            CertificateVerifier::default(),
            RevocationChecker::new(cache),
            VerificationCache::new(),
        );
        validator.record_signature(&cert, true);

        assert!(validator.valid_at_date(&cert, at(2025, 6, 1)));
        assert!(!validator.valid_at_date(&cert, at(2026, 3, 1)));
        assert_eq!(validator.revocation_date(&cert, at(2027, 1, 1)), Some(at(2026, 3, 1)));
        assert_eq!(validator.revocation_date(&cert, at(2026, 2, 28)), None);

        let results = validator
            .verification_results_at_date(&cert, at(2027, 1, 1))
            .unwrap();
        assert_eq!(results[&CheckName::CertNotRevoked], false);
    }

    #[test]
    fn test_check_names() {
        assert_eq!(CheckName::SignatureOk.to_string(), "SIGNATURE_OK");
        assert_eq!(
            serde_json::to_string(&CheckName::CertTimeValidityOk).unwrap(),
            "\"CERT_TIME_VALIDITY_OK\""
        );
    }
}
