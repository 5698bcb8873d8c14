use std::net::{Ipv4Addr, Ipv6Addr};

use num_bigint::BigInt;

use super::Name;
use super::name::decode_string;
use crate::asn1::{Asn1Error, Asn1Result, BitString, Encoder, Oid, Reader, Tlv, oid, tag};

/// A certificate (or CRL) extension.
///
/// `raw` holds the content of `extnValue` exactly as encoded, whether or not
/// the extension is recognised, so that re-encoding reproduces the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub oid: Oid,
    pub critical: bool,
    pub raw: Vec<u8>,
    pub value: ExtensionValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    SubjectAltNames(Vec<String>),
    AuthorityKeyId(AuthorityKeyId),
    SubjectKeyId(Vec<u8>),
    BasicConstraints(BasicConstraints),
    KeyUsage(KeyUsage),
    CertificatePolicies(Vec<PolicyInformation>),
    CrlDistributionPoints(Vec<DistributionPoint>),
    QcStatements(Vec<Oid>),
    /// Extension not in the recognised list
    RawBytes(Vec<u8>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyId {
    pub key_id: Option<Vec<u8>>,
    pub issuer: Option<Vec<String>>,
    pub serial: Option<BigInt>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_len: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyUsage {
    pub digital_signature: bool,
    pub non_repudiation: bool,
    pub key_encipherment: bool,
    pub data_encipherment: bool,
    pub key_agreement: bool,
    pub key_cert_sign: bool,
    pub crl_sign: bool,
    pub encipher_only: bool,
    pub decipher_only: bool,
}

impl From<&BitString> for KeyUsage {
    fn from(bits: &BitString) -> Self {
        Self {
            digital_signature: bits.bit(0),
            non_repudiation: bits.bit(1),
            key_encipherment: bits.bit(2),
            data_encipherment: bits.bit(3),
            key_agreement: bits.bit(4),
            key_cert_sign: bits.bit(5),
            crl_sign: bits.bit(6),
            encipher_only: bits.bit(7),
            decipher_only: bits.bit(8),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyInformation {
    pub policy_id: Oid,
    pub qualifiers: Vec<PolicyQualifier>,
}

/// Policy qualifier; `qualifier` is the CPS URI or the user notice text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyQualifier {
    pub id: Oid,
    pub qualifier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionPoint {
    pub dist_point: Option<Vec<String>>,
    pub reasons: Option<ReasonFlags>,
    pub issuer: Option<Vec<String>>,
}

const REASON_NAMES: [&str; 9] = [
    "unused",
    "keyCompromise",
    "cACompromise",
    "affiliationChanged",
    "superseded",
    "cessationOfOperation",
    "certificateHold",
    "privilegeWithdrawn",
    "aACompromise",
];

/// Revocation reasons covered by a distribution point
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonFlags(pub BitString);

impl ReasonFlags {
    pub fn names(&self) -> Vec<&'static str> {
        REASON_NAMES
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.0.bit(*idx))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl Extension {
    pub(crate) fn read(reader: &mut Reader<'_>) -> Asn1Result<Self> {
        const FIELD: &str = "extension";

        let mut seq = reader.sequence(FIELD)?;
        let ext_oid = seq.oid("extension.extnID")?;
        let critical = match seq.read_optional(tag::BOOLEAN, "extension.critical")? {
            Some(tlv) => tlv.as_boolean("extension.critical")?,
            None => false,
        };
        let raw = seq.read(tag::OCTET_STRING, "extension.extnValue")?.value.to_vec();
        seq.finish()?;

        let value = ExtensionValue::decode(&ext_oid, &raw)?;
        Ok(Self {
            oid: ext_oid,
            critical,
            raw,
            value,
        })
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.constructed(tag::SEQUENCE, |seq| {
            seq.oid(&self.oid);
            if self.critical {
                seq.boolean(true);
            }
            seq.octet_string(&self.raw);
        });
    }
}

/// Read a SEQUENCE OF Extension.
pub(crate) fn read_extensions(reader: &mut Reader<'_>, field: &'static str) -> Asn1Result<Vec<Extension>> {
    let mut seq = reader.sequence(field)?;
    let mut extensions = Vec::new();
    while !seq.is_empty() {
        extensions.push(Extension::read(&mut seq)?);
    }
    Ok(extensions)
}

pub(crate) fn encode_extensions(extensions: &[Extension], enc: &mut Encoder) {
    enc.constructed(tag::SEQUENCE, |seq| {
        for ext in extensions {
            ext.encode(seq);
        }
    });
}

impl ExtensionValue {
    /// Decode `extnValue` content for a recognised extension.
    ///
    /// Unknown identifiers are kept as raw bytes; a recognised extension that
    /// fails to decode is an error.
    pub fn decode(ext_oid: &Oid, raw: &[u8]) -> Asn1Result<Self> {
        let value = match ext_oid.as_str() {
            oid::EXT_SUBJECT_ALT_NAME => {
                let field = "extension.subjectAltName";
                let mut outer = Reader::new(raw, field);
                let names = general_names(outer.sequence(field)?, field)?;
                outer.finish()?;
                Self::SubjectAltNames(names)
            }
            oid::EXT_AUTHORITY_KEY_ID => Self::AuthorityKeyId(decode_authority_key_id(raw)?),
            oid::EXT_SUBJECT_KEY_ID => {
                let field = "extension.subjectKeyIdentifier";
                let mut outer = Reader::new(raw, field);
                let key_id = outer.octet_string(field)?;
                outer.finish()?;
                Self::SubjectKeyId(key_id)
            }
            oid::EXT_BASIC_CONSTRAINTS => {
                Self::BasicConstraints(decode_basic_constraints(raw)?)
            }
            oid::EXT_KEY_USAGE => {
                let field = "extension.keyUsage";
                let mut outer = Reader::new(raw, field);
                let bits = outer.bit_string(field)?;
                outer.finish()?;
                Self::KeyUsage(KeyUsage::from(&bits))
            }
            oid::EXT_CERTIFICATE_POLICIES => {
                Self::CertificatePolicies(decode_certificate_policies(raw)?)
            }
            oid::EXT_CRL_DISTRIBUTION_POINTS => {
                Self::CrlDistributionPoints(decode_distribution_points(raw)?)
            }
            oid::EXT_QC_STATEMENTS => {
                let field = "extension.qcStatements";
                let mut outer = Reader::new(raw, field);
                let mut seq = outer.sequence(field)?;
                outer.finish()?;
                let mut statements = Vec::new();
                while !seq.is_empty() {
                    let mut statement = seq.sequence(field)?;
                    statements.push(statement.oid(field)?);
                }
                Self::QcStatements(statements)
            }
            _ => Self::RawBytes(raw.to_vec()),
        };
        Ok(value)
    }
}

fn decode_authority_key_id(raw: &[u8]) -> Asn1Result<AuthorityKeyId> {
    const FIELD: &str = "extension.authorityKeyIdentifier";

    let mut outer = Reader::new(raw, FIELD);
    let mut seq = outer.sequence(FIELD)?;
    outer.finish()?;

    let key_id = seq
        .read_optional(tag::context(0), FIELD)?
        .map(|tlv| tlv.value.to_vec());
    let issuer = seq
        .read_optional(tag::context_constructed(1), FIELD)?
        .map(|tlv| general_names(tlv.reader(FIELD), FIELD))
        .transpose()?;
    let serial = seq
        .read_optional(tag::context(2), FIELD)?
        .map(|tlv| tlv.as_integer(FIELD))
        .transpose()?;
    seq.finish()?;

    Ok(AuthorityKeyId {
        key_id,
        issuer,
        serial,
    })
}

fn decode_basic_constraints(raw: &[u8]) -> Asn1Result<BasicConstraints> {
    const FIELD: &str = "extension.basicConstraints";

    let mut outer = Reader::new(raw, FIELD);
    let mut seq = outer.sequence(FIELD)?;
    outer.finish()?;

    let is_ca = match seq.read_optional(tag::BOOLEAN, FIELD)? {
        Some(tlv) => tlv.as_boolean(FIELD)?,
        None => false,
    };
    let max_path_len = match seq.read_optional(tag::INTEGER, FIELD)? {
        Some(tlv) => {
            let value = tlv.as_integer(FIELD)?;
            Some(u32::try_from(value).map_err(|_| {
                Asn1Error::malformed(FIELD, "Path length constraint out of range")
            })?)
        }
        None => None,
    };
    seq.finish()?;

    Ok(BasicConstraints {
        is_ca,
        max_path_len,
    })
}

fn decode_certificate_policies(raw: &[u8]) -> Asn1Result<Vec<PolicyInformation>> {
    const FIELD: &str = "extension.certificatePolicies";

    let mut outer = Reader::new(raw, FIELD);
    let mut seq = outer.sequence(FIELD)?;
    outer.finish()?;

    let mut policies = Vec::new();
    while !seq.is_empty() {
        let mut info = seq.sequence(FIELD)?;
        let policy_id = info.oid(FIELD)?;
        let mut qualifiers = Vec::new();
        if let Some(tlv) = info.read_optional(tag::SEQUENCE, FIELD)? {
            let mut list = tlv.reader(FIELD);
            while !list.is_empty() {
                let mut pq = list.sequence(FIELD)?;
                let id = pq.oid(FIELD)?;
                let qualifier = if pq.is_empty() {
                    None
                } else {
                    Some(policy_qualifier_text(&id, pq.read_any(FIELD)?)?)
                };
                qualifiers.push(PolicyQualifier { id, qualifier });
            }
        }
        info.finish()?;
        policies.push(PolicyInformation {
            policy_id,
            qualifiers,
        });
    }
    Ok(policies)
}

fn policy_qualifier_text(id: &Oid, value: Tlv<'_>) -> Asn1Result<String> {
    const FIELD: &str = "extension.certificatePolicies.qualifier";

    if *id == oid::QT_UNOTICE && value.tag == tag::SEQUENCE {
        // UserNotice ::= SEQUENCE { noticeRef NoticeReference OPTIONAL, explicitText DisplayText OPTIONAL }
        let mut notice = value.reader(FIELD);
        let mut organization = None;
        let mut explicit_text = None;
        while !notice.is_empty() {
            let part = notice.read_any(FIELD)?;
            if part.tag == tag::SEQUENCE {
                let mut reference = part.reader(FIELD);
                let org = reference.read_any(FIELD)?;
                organization = Some(decode_string(org.tag, org.value));
            } else {
                explicit_text = Some(decode_string(part.tag, part.value));
            }
        }
        return Ok(explicit_text.or(organization).unwrap_or_default());
    }
    Ok(decode_string(value.tag, value.value))
}

fn decode_distribution_points(raw: &[u8]) -> Asn1Result<Vec<DistributionPoint>> {
    const FIELD: &str = "extension.cRLDistributionPoints";

    let mut outer = Reader::new(raw, FIELD);
    let mut seq = outer.sequence(FIELD)?;
    outer.finish()?;

    let mut points = Vec::new();
    while !seq.is_empty() {
        let mut dp = seq.sequence(FIELD)?;
        let mut point = DistributionPoint::default();

        if let Some(mut name) = dp.explicit(0, FIELD)? {
            let choice = name.read_any(FIELD)?;
            point.dist_point = Some(match choice.tag {
                // fullName [0] IMPLICIT GeneralNames
                t if t == tag::context_constructed(0) => general_names(choice.reader(FIELD), FIELD)?,
                // nameRelativeToCRLIssuer [1] IMPLICIT RelativeDistinguishedName
                _ => vec![format!("relativeName#{}", hex::encode(choice.value))],
            });
            name.finish()?;
        }
        if let Some(tlv) = dp.read_optional(tag::context(1), FIELD)? {
            point.reasons = Some(ReasonFlags(tlv.as_bit_string(FIELD)?));
        }
        if let Some(tlv) = dp.read_optional(tag::context_constructed(2), FIELD)? {
            point.issuer = Some(general_names(tlv.reader(FIELD), FIELD)?);
        }
        dp.finish()?;
        points.push(point);
    }
    Ok(points)
}

/// Render every GeneralName in `names` as `TYPE:value`.
pub(crate) fn general_names(mut names: Reader<'_>, field: &'static str) -> Asn1Result<Vec<String>> {
    let mut out = Vec::new();
    while !names.is_empty() {
        out.push(general_name(&names.read_any(field)?, field)?);
    }
    Ok(out)
}

fn general_name(tlv: &Tlv<'_>, field: &'static str) -> Asn1Result<String> {
    let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
    let rendered = match tlv.tag {
        0xA0 => {
            let mut other = tlv.reader(field);
            format!("othername:{}", other.oid(field)?)
        }
        0x81 => format!("email:{}", text(tlv.value)),
        0x82 => format!("DNS:{}", text(tlv.value)),
        0xA4 => {
            let mut inner = tlv.reader(field);
            let name = Name::read(&mut inner, field)?;
            inner.finish()?;
            format!("DirName:{name}")
        }
        0x86 => format!("URI:{}", text(tlv.value)),
        0x87 => match tlv.value.len() {
            4 => {
                let octets: [u8; 4] = tlv.value.try_into().unwrap_or_default();
                format!("IP:{}", Ipv4Addr::from(octets))
            }
            16 => {
                let octets: [u8; 16] = tlv.value.try_into().unwrap_or_default();
                format!("IP:{}", Ipv6Addr::from(octets))
            }
            _ => format!("IP:#{}", hex::encode(tlv.value)),
        },
        0x88 => format!("RID:{}", tlv.as_oid(field)?),
        other => format!("[{}]#{}", other & 0x1F, hex::encode(tlv.value)),
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension_der(ext_oid: &str, critical: bool, value: Vec<u8>) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.constructed(tag::SEQUENCE, |seq| {
            seq.oid(&ext_oid.parse::<Oid>().unwrap());
            if critical {
                seq.boolean(true);
            }
            seq.octet_string(&value);
        });
        enc.finish()
    }

    fn decode(der: &[u8]) -> Asn1Result<Extension> {
        let mut reader = Reader::new(der, "test");
        Extension::read(&mut reader)
    }

    #[test]
    fn test_basic_constraints() {
        let mut value = Encoder::new();
        value.constructed(tag::SEQUENCE, |seq| {
            seq.boolean(true).small_integer(1);
        });
        let ext = decode(&extension_der(oid::EXT_BASIC_CONSTRAINTS, true, value.finish())).unwrap();

        assert!(ext.critical);
        assert_eq!(
            ext.value,
            ExtensionValue::BasicConstraints(BasicConstraints {
                is_ca: true,
                max_path_len: Some(1)
            })
        );

        // Empty SEQUENCE: end entity without path length
        let ext = decode(&extension_der(oid::EXT_BASIC_CONSTRAINTS, false, vec![0x30, 0x00])).unwrap();
        assert_eq!(
            ext.value,
            ExtensionValue::BasicConstraints(BasicConstraints::default())
        );
    }

    #[test]
    fn test_key_usage_flags() {
        // digitalSignature, nonRepudiation, decipherOnly
        let value = vec![0x03, 0x03, 0x07, 0xC0, 0x80];
        let ext = decode(&extension_der(oid::EXT_KEY_USAGE, true, value)).unwrap();
        let ExtensionValue::KeyUsage(usage) = ext.value else {
            panic!("expected key usage");
        };
        assert!(usage.digital_signature);
        assert!(usage.non_repudiation);
        assert!(!usage.key_cert_sign);
        assert!(usage.decipher_only);
    }

    #[test]
    fn test_subject_alt_names() {
        let mut value = Encoder::new();
        value.constructed(tag::SEQUENCE, |seq| {
            seq.tlv(0x81, b"podatelna@example.cz")
                .tlv(0x82, b"example.cz")
                .tlv(0x87, &[192, 168, 1, 10]);
        });
        let ext = decode(&extension_der(oid::EXT_SUBJECT_ALT_NAME, false, value.finish())).unwrap();
        assert_eq!(
            ext.value,
            ExtensionValue::SubjectAltNames(vec![
                "email:podatelna@example.cz".to_string(),
                "DNS:example.cz".to_string(),
                "IP:192.168.1.10".to_string(),
            ])
        );
    }

    #[test]
    fn test_authority_key_id_with_issuer_and_serial() {
        let issuer = Name::from_attributes([(oid::AT_COMMON_NAME, "Root")]);
        let mut value = Encoder::new();
        value.constructed(tag::SEQUENCE, |seq| {
            seq.tlv(tag::context(0), &[0x01, 0x02, 0x03]);
            seq.constructed(tag::context_constructed(1), |names| {
                names.constructed(0xA4, |dir| issuer.encode(dir));
            });
            seq.tlv(tag::context(2), &[0x01, 0x00]);
        });
        let ext = decode(&extension_der(oid::EXT_AUTHORITY_KEY_ID, false, value.finish())).unwrap();
        assert_eq!(
            ext.value,
            ExtensionValue::AuthorityKeyId(AuthorityKeyId {
                key_id: Some(vec![0x01, 0x02, 0x03]),
                issuer: Some(vec!["DirName:CN=Root".to_string()]),
                serial: Some(BigInt::from(256)),
            })
        );
    }

    #[test]
    fn test_policies_and_distribution_points() {
        let mut value = Encoder::new();
        value.constructed(tag::SEQUENCE, |seq| {
            seq.constructed(tag::SEQUENCE, |info| {
                info.oid(&"1.3.6.1.4.1.11801.4.1.1".parse().unwrap());
                info.constructed(tag::SEQUENCE, |quals| {
                    quals.constructed(tag::SEQUENCE, |pq| {
                        pq.oid(&Oid::from(oid::QT_CPS));
                        pq.tlv(tag::IA5_STRING, b"http://www.postsignum.cz/cps");
                    });
                    quals.constructed(tag::SEQUENCE, |pq| {
                        pq.oid(&Oid::from(oid::QT_UNOTICE));
                        pq.constructed(tag::SEQUENCE, |notice| {
                            notice.tlv(tag::UTF8_STRING, b"Qualified certificate");
                        });
                    });
                });
            });
        });
        let ext =
            decode(&extension_der(oid::EXT_CERTIFICATE_POLICIES, false, value.finish())).unwrap();
        let ExtensionValue::CertificatePolicies(policies) = ext.value else {
            panic!("expected policies");
        };
        assert_eq!(policies[0].policy_id, "1.3.6.1.4.1.11801.4.1.1");
        assert_eq!(
            policies[0].qualifiers[0].qualifier.as_deref(),
            Some("http://www.postsignum.cz/cps")
        );
        assert_eq!(
            policies[0].qualifiers[1].qualifier.as_deref(),
            Some("Qualified certificate")
        );

        let mut value = Encoder::new();
        value.constructed(tag::SEQUENCE, |seq| {
            seq.constructed(tag::SEQUENCE, |dp| {
                dp.constructed(tag::context_constructed(0), |name| {
                    name.constructed(tag::context_constructed(0), |full| {
                        full.tlv(0x86, b"http://crl.example.cz/root.crl");
                    });
                });
                dp.tlv(tag::context(1), &[0x05, 0x60]);
            });
        });
        let ext = decode(&extension_der(
            oid::EXT_CRL_DISTRIBUTION_POINTS,
            false,
            value.finish(),
        ))
        .unwrap();
        let ExtensionValue::CrlDistributionPoints(points) = ext.value else {
            panic!("expected distribution points");
        };
        assert_eq!(
            points[0].dist_point,
            Some(vec!["URI:http://crl.example.cz/root.crl".to_string()])
        );
        assert_eq!(
            points[0].reasons.as_ref().unwrap().names(),
            vec!["keyCompromise", "cACompromise"]
        );
        assert!(points[0].issuer.is_none());
    }

    #[test]
    fn test_qc_statements() {
        let mut value = Encoder::new();
        value.constructed(tag::SEQUENCE, |seq| {
            seq.constructed(tag::SEQUENCE, |st| {
                st.oid(&"0.4.0.1862.1.1".parse().unwrap());
            });
            seq.constructed(tag::SEQUENCE, |st| {
                st.oid(&"0.4.0.1862.1.4".parse().unwrap());
                st.null();
            });
        });
        let ext = decode(&extension_der(oid::EXT_QC_STATEMENTS, false, value.finish())).unwrap();
        assert_eq!(
            ext.value,
            ExtensionValue::QcStatements(vec![
                "0.4.0.1862.1.1".parse().unwrap(),
                "0.4.0.1862.1.4".parse().unwrap(),
            ])
        );
    }

    #[test]
    fn test_unknown_extension_kept_raw() {
        let der = extension_der("1.2.3.4.5", true, vec![0xDE, 0xAD]);
        let ext = decode(&der).unwrap();
        assert_eq!(ext.value, ExtensionValue::RawBytes(vec![0xDE, 0xAD]));

        let mut enc = Encoder::new();
        ext.encode(&mut enc);
        assert_eq!(enc.finish(), der);
    }

    #[test]
    fn test_malformed_known_extension_fails() {
        let der = extension_der(oid::EXT_KEY_USAGE, true, vec![0x04, 0x01, 0x00]);
        let err = decode(&der).unwrap_err();
        assert_eq!(err.field(), "extension.keyUsage");
    }
}
