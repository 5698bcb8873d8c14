use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    CertificateValidator, MessageVerification, TimestampVerification, VerificationResults,
};
use crate::x509::SignedCertificate;

/// Summary of one certificate at a reference date
#[derive(Debug, Clone, Serialize)]
pub struct CertificateReport {
    pub subject: String,
    pub issuer: String,
    /// Serial number in hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Recorded and date-dependent checks; absent when never verified
    pub checks: Option<VerificationResults>,
    pub valid: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl CertificateReport {
    pub fn new(cert: &SignedCertificate, validator: &CertificateValidator, date: DateTime<Utc>) -> Self {
        let validity = cert.validity();
        Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: cert.serial_number().to_str_radix(16),
            not_before: validity.not_before.at(),
            not_after: validity.not_after.at(),
            checks: validator.verification_results_at_date(cert, date),
            valid: validator.valid_at_date(cert, date),
            revoked_at: validator.revocation_date(cert, date),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimestampReport {
    pub signature_verified: bool,
    pub imprint_matches: bool,
    pub gen_time: DateTime<Utc>,
    pub tsa: Option<String>,
    pub serial: String,
    pub policy: String,
}

impl From<&TimestampVerification> for TimestampReport {
    fn from(verification: &TimestampVerification) -> Self {
        let info = &verification.token.info;
        Self {
            signature_verified: verification.signature_verified,
            imprint_matches: verification.imprint_matches,
            gen_time: info.gen_time.at(),
            tsa: info.tsa.as_ref().map(ToString::to_string),
            serial: info.serial_number.to_str_radix(16),
            policy: info.policy.to_string(),
        }
    }
}

/// Serializable result of verifying one input
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub source: String,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationReport {
    fn empty(source: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            source: source.into(),
            checked_at,
            message_verified: None,
            certificates_verified: None,
            content_length: None,
            certificates: Vec::new(),
            timestamp: None,
            error: None,
        }
    }

    pub fn for_message(
        source: impl Into<String>,
        verification: &MessageVerification,
        validator: &CertificateValidator,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_verified: Some(verification.message_verified),
            certificates_verified: Some(verification.certificates_verified),
            content_length: Some(verification.message.content.len()),
            certificates: verification
                .message
                .certificates
                .iter()
                .map(|cert| CertificateReport::new(cert, validator, checked_at))
                .collect(),
            ..Self::empty(source, checked_at)
        }
    }

    pub fn for_certificate(
        source: impl Into<String>,
        cert: &SignedCertificate,
        validator: &CertificateValidator,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            certificates: vec![CertificateReport::new(cert, validator, checked_at)],
            ..Self::empty(source, checked_at)
        }
    }

    pub fn for_timestamp(
        source: impl Into<String>,
        verification: &TimestampVerification,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content_length: Some(verification.token.envelope.content.len()),
            timestamp: Some(TimestampReport::from(verification)),
            ..Self::empty(source, checked_at)
        }
    }

    pub fn for_error(
        source: impl Into<String>,
        error: impl ToString,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::empty(source, checked_at)
        }
    }

    /// Whether nothing in the report indicates a problem
    pub fn is_trusted(&self) -> bool {
        self.error.is_none()
            && self.message_verified != Some(false)
            && self.certificates_verified != Some(false)
            && self.certificates.iter().all(|cert| cert.valid)
            && self
                .timestamp
                .as_ref()
                .is_none_or(|ts| ts.signature_verified && ts.imprint_matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_report() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let report = VerificationReport::for_error("zprava.zfo", "Truncated input", at);
        assert!(!report.is_trusted());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["source"], "zprava.zfo");
        assert_eq!(json["error"], "Truncated input");
        assert!(json.get("certificates").is_none());
        assert!(json.get("message_verified").is_none());
    }

    #[test]
    fn test_empty_report_is_trusted() {
        let report = VerificationReport::empty("nothing", Utc::now());
        assert!(report.is_trusted());
    }
}
