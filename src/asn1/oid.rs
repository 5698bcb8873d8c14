//! Object identifiers and the list of OIDs known to the verifier.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::{Asn1Error, Asn1Result};

/// An OBJECT IDENTIFIER kept in its dotted string form.
///
/// Ordering follows the numeric value of the arcs, so `2.5.4.3` sorts before `2.5.4.10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(String);

impl Oid {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the content octets of an OBJECT IDENTIFIER.
    pub fn from_der_value(value: &[u8], field: &'static str) -> Asn1Result<Self> {
        if value.is_empty() {
            return Err(Asn1Error::malformed(field, "Empty object identifier"));
        }

        let mut arcs: Vec<u64> = Vec::new();
        let mut current: u64 = 0;
        let mut in_arc = false;
        for &byte in value {
            if !in_arc && byte == 0x80 {
                return Err(Asn1Error::malformed(field, "Non-minimal OID arc"));
            }
            if current > (u64::MAX >> 7) {
                return Err(Asn1Error::unsupported(field, "OID arc too large"));
            }
            current = (current << 7) | u64::from(byte & 0x7F);
            in_arc = byte & 0x80 != 0;
            if !in_arc {
                arcs.push(current);
                current = 0;
            }
        }
        if in_arc {
            return Err(Asn1Error::malformed(field, "Truncated OID arc"));
        }

        let first = arcs[0];
        let (root, second) = match first {
            0..=39 => (0, first),
            40..=79 => (1, first - 40),
            _ => (2, first - 80),
        };
        let mut dotted = format!("{root}.{second}");
        for arc in &arcs[1..] {
            dotted.push('.');
            dotted.push_str(&arc.to_string());
        }
        Ok(Self(dotted))
    }

    /// Content octets of the DER encoding
    pub fn to_der_value(&self) -> Vec<u8> {
        let arcs: Vec<u64> = self
            .0
            .split('.')
            .filter_map(|arc| arc.parse().ok())
            .collect();
        let mut out = Vec::new();
        if arcs.len() < 2 {
            return out;
        }
        push_base128(u128::from(arcs[0]) * 40 + u128::from(arcs[1]), &mut out);
        for &arc in &arcs[2..] {
            push_base128(u128::from(arc), &mut out);
        }
        out
    }

    /// Short display name for well-known identifiers
    pub fn short_name(&self) -> Option<&'static str> {
        NAMES
            .iter()
            .find(|(oid, _)| *oid == self.0)
            .map(|(_, name)| *name)
    }
}

fn push_base128(mut value: u128, out: &mut Vec<u8>) {
    let mut chunk = [0u8; 19];
    let mut idx = chunk.len();
    loop {
        idx -= 1;
        chunk[idx] = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = chunk.len() - 1;
    for (i, byte) in chunk.iter().enumerate().skip(idx) {
        out.push(if i == last { *byte } else { byte | 0x80 });
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        let arcs = |oid: &Oid| {
            oid.0
                .split('.')
                .map(|arc| arc.parse::<u64>().unwrap_or(u64::MAX))
                .collect::<Vec<_>>()
        };
        arcs(self)
            .cmp(&arcs(other))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Oid {
    type Err = Asn1Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Asn1Error::malformed("oid", format!("Invalid OID '{s}'"));
        let arcs = s
            .split('.')
            .map(|arc| arc.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        if arcs.len() < 2 {
            return Err(invalid());
        }
        // the first two arcs share one subidentifier, which must decode back
        match arcs[0] {
            0 | 1 if arcs[1] < 40 => {}
            2 if arcs[1].checked_add(80).is_some() => {}
            _ => return Err(invalid()),
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&'static str> for Oid {
    /// For the constants below; arbitrary input should go through `FromStr`.
    fn from(value: &'static str) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for Oid {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Oid {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// Digest algorithms
pub const SHA1: &str = "1.3.14.3.2.26";
pub const SHA224: &str = "2.16.840.1.101.3.4.2.4";
pub const SHA256: &str = "2.16.840.1.101.3.4.2.1";
pub const SHA384: &str = "2.16.840.1.101.3.4.2.2";
pub const SHA512: &str = "2.16.840.1.101.3.4.2.3";

// RSA
pub const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
pub const MD5_WITH_RSA: &str = "1.2.840.113549.1.1.4";
pub const SHA1_WITH_RSA: &str = "1.2.840.113549.1.1.5";
pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
pub const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
pub const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";
pub const SHA224_WITH_RSA: &str = "1.2.840.113549.1.1.14";

// PKCS#7 / CMS content types and attributes
pub const PKCS7_DATA: &str = "1.2.840.113549.1.7.1";
pub const PKCS7_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
pub const CT_TST_INFO: &str = "1.2.840.113549.1.9.16.1.4";
pub const ATTR_CONTENT_TYPE: &str = "1.2.840.113549.1.9.3";
pub const ATTR_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
pub const ATTR_SIGNING_TIME: &str = "1.2.840.113549.1.9.5";

// Certificate extensions
pub const EXT_SUBJECT_KEY_ID: &str = "2.5.29.14";
pub const EXT_KEY_USAGE: &str = "2.5.29.15";
pub const EXT_SUBJECT_ALT_NAME: &str = "2.5.29.17";
pub const EXT_BASIC_CONSTRAINTS: &str = "2.5.29.19";
pub const EXT_CRL_REASON: &str = "2.5.29.21";
pub const EXT_CRL_DISTRIBUTION_POINTS: &str = "2.5.29.31";
pub const EXT_CERTIFICATE_POLICIES: &str = "2.5.29.32";
pub const EXT_AUTHORITY_KEY_ID: &str = "2.5.29.35";
pub const EXT_QC_STATEMENTS: &str = "1.3.6.1.5.5.7.1.3";

// Policy qualifiers
pub const QT_CPS: &str = "1.3.6.1.5.5.7.2.1";
pub const QT_UNOTICE: &str = "1.3.6.1.5.5.7.2.2";

// Name attributes
pub const AT_COMMON_NAME: &str = "2.5.4.3";
pub const AT_SURNAME: &str = "2.5.4.4";
pub const AT_SERIAL_NUMBER: &str = "2.5.4.5";
pub const AT_COUNTRY: &str = "2.5.4.6";
pub const AT_LOCALITY: &str = "2.5.4.7";
pub const AT_STATE: &str = "2.5.4.8";
pub const AT_STREET: &str = "2.5.4.9";
pub const AT_ORGANIZATION: &str = "2.5.4.10";
pub const AT_ORGANIZATIONAL_UNIT: &str = "2.5.4.11";
pub const AT_TITLE: &str = "2.5.4.12";
pub const AT_GIVEN_NAME: &str = "2.5.4.42";
pub const AT_EMAIL: &str = "1.2.840.113549.1.9.1";

const NAMES: &[(&str, &str)] = &[
    (AT_COMMON_NAME, "CN"),
    (AT_SURNAME, "SN"),
    (AT_SERIAL_NUMBER, "serialNumber"),
    (AT_COUNTRY, "C"),
    (AT_LOCALITY, "L"),
    (AT_STATE, "ST"),
    (AT_STREET, "street"),
    (AT_ORGANIZATION, "O"),
    (AT_ORGANIZATIONAL_UNIT, "OU"),
    (AT_TITLE, "title"),
    (AT_GIVEN_NAME, "GN"),
    (AT_EMAIL, "emailAddress"),
    (SHA1_WITH_RSA, "SHA1withRSA"),
    (SHA224_WITH_RSA, "SHA224withRSA"),
    (SHA256_WITH_RSA, "SHA256withRSA"),
    (SHA384_WITH_RSA, "SHA384withRSA"),
    (SHA512_WITH_RSA, "SHA512withRSA"),
    (MD5_WITH_RSA, "MD5withRSA"),
    (RSA_ENCRYPTION, "rsaEncryption"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oid_decode() {
        // 1.2.840.113549.1.1.11
        let value = [0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];
        let oid = Oid::from_der_value(&value, "oid").unwrap();
        assert_eq!(oid, SHA256_WITH_RSA);
        assert_eq!(oid.to_der_value(), value);
    }

    #[test]
    fn test_oid_root_two() {
        // 2.16.840.1.101.3.4.2.1
        let value = [0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
        let oid = Oid::from_der_value(&value, "oid").unwrap();
        assert_eq!(oid.as_str(), SHA256);
        assert_eq!(Oid::from(SHA256).to_der_value(), value);
    }

    #[test]
    fn test_oid_truncated() {
        assert!(Oid::from_der_value(&[0x2A, 0x86], "oid").is_err());
        assert!(Oid::from_der_value(&[], "oid").is_err());
        assert!(Oid::from_der_value(&[0x2A, 0x80, 0x01], "oid").is_err());
    }

    #[test]
    fn test_oid_from_str() {
        assert!("2.5.4.3".parse::<Oid>().is_ok());
        assert!("2.5..3".parse::<Oid>().is_err());
        assert!("7.1".parse::<Oid>().is_err());
        assert!("abc".parse::<Oid>().is_err());
        assert!("1.40".parse::<Oid>().is_err());
        assert!("2.-1".parse::<Oid>().is_err());
    }

    #[test]
    fn test_huge_second_arc() {
        assert!("2.18446744073709551615".parse::<Oid>().is_err());

        let largest: Oid = "2.18446744073709551535.7".parse().unwrap();
        let value = largest.to_der_value();
        assert_eq!(value.len(), 11);
        assert_eq!(Oid::from_der_value(&value, "oid").unwrap(), largest);
    }

    #[test]
    fn test_numeric_ordering() {
        let mut oids = vec![
            Oid::from(AT_ORGANIZATION),
            Oid::from(AT_COUNTRY),
            Oid::from(AT_COMMON_NAME),
            Oid::from(AT_EMAIL),
        ];
        oids.sort();
        assert_eq!(oids, vec![AT_EMAIL, AT_COMMON_NAME, AT_COUNTRY, AT_ORGANIZATION]);
    }

    #[test]
    fn test_short_names() {
        assert_eq!(Oid::from(AT_COMMON_NAME).short_name(), Some("CN"));
        assert_eq!(Oid::from(SHA1_WITH_RSA).short_name(), Some("SHA1withRSA"));
        assert_eq!(Oid::from("1.2.3.4").short_name(), None);
    }
}
