use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};

use super::extensions::{encode_extensions, read_extensions};
use super::{BasicConstraints, Extension, ExtensionValue, KeyUsage, Name, Validity};
use crate::asn1::{
    Asn1Error, Asn1Result, BitString, Encoder, Oid, Reader, Tlv, oid, tag,
};

/// Algorithm identifier with its parameters kept as encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmIdentifier {
    pub oid: Oid,
    /// Complete encoding of the parameters element, if any
    pub parameters: Option<Vec<u8>>,
}

impl AlgorithmIdentifier {
    /// Identifier with NULL parameters, as used by RSA and the SHA family
    pub fn with_null_parameters(oid: Oid) -> Self {
        Self {
            oid,
            parameters: Some(vec![tag::NULL, 0x00]),
        }
    }

    pub(crate) fn read(reader: &mut Reader<'_>, field: &'static str) -> Asn1Result<Self> {
        let mut seq = reader.sequence(field)?;
        let oid = seq.oid(field)?;
        let parameters = if seq.is_empty() {
            None
        } else {
            Some(seq.read_any(field)?.raw.to_vec())
        };
        seq.finish()?;
        Ok(Self { oid, parameters })
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.constructed(tag::SEQUENCE, |seq| {
            seq.oid(&self.oid);
            if let Some(parameters) = &self.parameters {
                seq.raw(parameters);
            }
        });
    }

    /// Readable name such as `SHA256withRSA`, or the dotted OID
    pub fn name(&self) -> String {
        self.oid
            .short_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.oid.to_string())
    }
}

/// Modulus and public exponent of an RSA key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaComponents {
    pub modulus: BigUint,
    pub exponent: BigUint,
}

/// SubjectPublicKeyInfo. Only RSA keys are decoded further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    pub algorithm: AlgorithmIdentifier,
    pub key: BitString,
    pub rsa: Option<RsaComponents>,
}

impl PublicKeyInfo {
    pub(crate) fn read(reader: &mut Reader<'_>) -> Asn1Result<Self> {
        const FIELD: &str = "tbsCertificate.subjectPublicKeyInfo";

        let mut seq = reader.sequence(FIELD)?;
        let algorithm = AlgorithmIdentifier::read(&mut seq, FIELD)?;
        let key = seq.bit_string(FIELD)?;
        seq.finish()?;

        let rsa = if algorithm.oid == oid::RSA_ENCRYPTION {
            Some(decode_rsa_key(&key.bytes)?)
        } else {
            None
        };
        Ok(Self {
            algorithm,
            key,
            rsa,
        })
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.constructed(tag::SEQUENCE, |seq| {
            self.algorithm.encode(seq);
            seq.bit_string(&self.key);
        });
    }
}

// RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }
fn decode_rsa_key(bytes: &[u8]) -> Asn1Result<RsaComponents> {
    const FIELD: &str = "tbsCertificate.subjectPublicKeyInfo.rsaPublicKey";

    let mut outer = Reader::new(bytes, FIELD);
    let mut seq = outer.sequence(FIELD)?;
    outer.finish()?;
    let modulus = seq.integer(FIELD)?;
    let exponent = seq.integer(FIELD)?;
    seq.finish()?;

    let unsigned = |value: BigInt| match value.to_biguint() {
        Some(value) if value.bits() > 0 => Ok(value),
        _ => Err(Asn1Error::malformed(FIELD, "RSA key component must be positive")),
    };
    Ok(RsaComponents {
        modulus: unsigned(modulus)?,
        exponent: unsigned(exponent)?,
    })
}

/// The tbsCertificate part of an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Encoded version number: 0 for v1, 2 for v3
    pub version: i64,
    pub serial_number: BigInt,
    pub signature_algorithm: AlgorithmIdentifier,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub pub_key: PublicKeyInfo,
    pub issuer_uid: Option<BitString>,
    pub subject_uid: Option<BitString>,
    pub extensions: Vec<Extension>,
}

impl Certificate {
    pub fn from_der(data: &[u8]) -> Asn1Result<Self> {
        let tlv = Tlv::parse_exact(data, "tbsCertificate")?;
        Self::decode(&tlv)
    }

    pub(crate) fn decode(tlv: &Tlv<'_>) -> Asn1Result<Self> {
        if tlv.tag != tag::SEQUENCE {
            return Err(Asn1Error::malformed(
                "tbsCertificate",
                format!("Expected SEQUENCE, found 0x{:02X}", tlv.tag),
            ));
        }
        let mut seq = tlv.reader("tbsCertificate");

        let version = match seq.explicit(0, "tbsCertificate.version")? {
            Some(mut inner) => {
                let version = inner.small_integer("tbsCertificate.version")?;
                inner.finish()?;
                version
            }
            None => 0,
        };
        let serial_number = seq.integer("tbsCertificate.serialNumber")?;
        let signature_algorithm = AlgorithmIdentifier::read(&mut seq, "tbsCertificate.signature")?;
        let issuer = Name::read(&mut seq, "tbsCertificate.issuer")?;
        let validity = Validity::read(&mut seq, "tbsCertificate.validity")?;
        let subject = Name::read(&mut seq, "tbsCertificate.subject")?;
        let pub_key = PublicKeyInfo::read(&mut seq)?;

        let issuer_uid = seq
            .read_optional(tag::context(1), "tbsCertificate.issuerUniqueID")?
            .map(|tlv| tlv.as_bit_string("tbsCertificate.issuerUniqueID"))
            .transpose()?;
        let subject_uid = seq
            .read_optional(tag::context(2), "tbsCertificate.subjectUniqueID")?
            .map(|tlv| tlv.as_bit_string("tbsCertificate.subjectUniqueID"))
            .transpose()?;
        let extensions = match seq.explicit(3, "tbsCertificate.extensions")? {
            Some(mut inner) => {
                let extensions = read_extensions(&mut inner, "tbsCertificate.extensions")?;
                inner.finish()?;
                extensions
            }
            None => Vec::new(),
        };
        seq.finish()?;

        Ok(Self {
            version,
            serial_number,
            signature_algorithm,
            issuer,
            validity,
            subject,
            pub_key,
            issuer_uid,
            subject_uid,
            extensions,
        })
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.constructed(tag::SEQUENCE, |seq| {
            if self.version != 0 {
                seq.constructed(tag::context_constructed(0), |v| {
                    v.small_integer(self.version);
                });
            }
            seq.integer(&self.serial_number);
            self.signature_algorithm.encode(seq);
            self.issuer.encode(seq);
            self.validity.encode(seq);
            self.subject.encode(seq);
            self.pub_key.encode(seq);
            if let Some(uid) = &self.issuer_uid {
                seq.bit_string_tagged(tag::context(1), uid);
            }
            if let Some(uid) = &self.subject_uid {
                seq.bit_string_tagged(tag::context(2), uid);
            }
            if !self.extensions.is_empty() {
                seq.constructed(tag::context_constructed(3), |exts| {
                    encode_extensions(&self.extensions, exts);
                });
            }
        });
    }

    /// Canonical DER encoding, the bytes covered by the issuer's signature
    pub fn to_der(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        enc.finish()
    }

    pub fn extension(&self, ext_oid: &str) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.oid == ext_oid)
    }

    pub fn basic_constraints(&self) -> Option<BasicConstraints> {
        match self.extension(oid::EXT_BASIC_CONSTRAINTS)?.value {
            ExtensionValue::BasicConstraints(bc) => Some(bc),
            _ => None,
        }
    }

    pub fn key_usage(&self) -> Option<KeyUsage> {
        match self.extension(oid::EXT_KEY_USAGE)?.value {
            ExtensionValue::KeyUsage(usage) => Some(usage),
            _ => None,
        }
    }

    pub fn is_self_issued(&self) -> bool {
        self.issuer == self.subject
    }
}

/// Issuer name and serial number, which identify a certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateId {
    pub issuer: Name,
    pub serial: BigInt,
}

impl CertificateId {
    pub fn new(issuer: Name, serial: BigInt) -> Self {
        Self { issuer, serial }
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.issuer, self.serial.to_str_radix(16))
    }
}

/// A complete X.509 certificate: tbsCertificate plus the issuer's signature.
///
/// Verification results are not stored here; see `pki::VerificationCache`.
#[derive(Debug, Clone)]
pub struct SignedCertificate {
    pub tbs: Certificate,
    pub signature_algorithm: AlgorithmIdentifier,
    pub signature: Vec<u8>,
    raw: Vec<u8>,
}

impl SignedCertificate {
    /// Decode a DER certificate. Trailing bytes are rejected.
    pub fn from_der(data: &[u8]) -> Asn1Result<Self> {
        let tlv = Tlv::parse_exact(data, "certificate")?;
        Self::decode(&tlv)
    }

    pub(crate) fn decode(tlv: &Tlv<'_>) -> Asn1Result<Self> {
        if tlv.tag != tag::SEQUENCE {
            return Err(Asn1Error::malformed(
                "certificate",
                format!("Expected SEQUENCE, found 0x{:02X}", tlv.tag),
            ));
        }
        let mut seq = tlv.reader("certificate");
        let tbs_tlv = seq.read(tag::SEQUENCE, "tbsCertificate")?;
        let tbs = Certificate::decode(&tbs_tlv)?;
        let signature_algorithm =
            AlgorithmIdentifier::read(&mut seq, "certificate.signatureAlgorithm")?;
        let signature = seq.bit_string("certificate.signatureValue")?;
        seq.finish()?;

        if signature.unused_bits != 0 {
            return Err(Asn1Error::malformed(
                "certificate.signatureValue",
                "Signature is not a whole number of bytes",
            ));
        }

        Ok(Self {
            tbs,
            signature_algorithm,
            signature: signature.bytes,
            raw: tlv.raw.to_vec(),
        })
    }

    /// Re-encode the whole certificate from the model
    pub fn to_der(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.constructed(tag::SEQUENCE, |seq| {
            self.tbs.encode(seq);
            self.signature_algorithm.encode(seq);
            seq.bit_string(&BitString::new(self.signature.clone()));
        });
        enc.finish()
    }

    /// The bytes this certificate was decoded from
    pub fn raw_der(&self) -> &[u8] {
        &self.raw
    }

    pub fn id(&self) -> CertificateId {
        CertificateId::new(self.tbs.issuer.clone(), self.tbs.serial_number.clone())
    }

    pub fn issuer(&self) -> &Name {
        &self.tbs.issuer
    }

    pub fn subject(&self) -> &Name {
        &self.tbs.subject
    }

    pub fn serial_number(&self) -> &BigInt {
        &self.tbs.serial_number
    }

    pub fn validity(&self) -> &Validity {
        &self.tbs.validity
    }

    /// Serial number as unsigned magnitude, the form CRL fast-path entries use
    pub fn serial_magnitude(&self) -> BigUint {
        match self.tbs.serial_number.sign() {
            Sign::Minus => BigUint::default(),
            _ => self.tbs.serial_number.magnitude().clone(),
        }
    }
}

impl PartialEq for SignedCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.tbs == other.tbs
            && self.signature_algorithm == other.signature_algorithm
            && self.signature == other.signature
    }
}

impl Eq for SignedCertificate {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use openssl::asn1::Asn1Time as OsslTime;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::extension::{BasicConstraints as OsslBc, KeyUsage as OsslKu};
    use openssl::x509::{X509, X509NameBuilder};

    fn build(key: &PKey<Private>, with_extensions: bool) -> Vec<u8> {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("C", "CZ").unwrap();
        name.append_entry_by_text("O", "Test Organisation").unwrap();
        name.append_entry_by_text("CN", "Unit Test CA").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_hex_str("00C0FFEE").unwrap();
        builder
            .set_serial_number(&serial.to_asn1_integer().unwrap())
            .unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(key).unwrap();
        builder
            .set_not_before(&OsslTime::from_str_x509("20200101000000Z").unwrap())
            .unwrap();
        builder
            .set_not_after(&OsslTime::from_str_x509("20300101000000Z").unwrap())
            .unwrap();
        if with_extensions {
            builder
                .append_extension(OsslBc::new().critical().ca().pathlen(0).build().unwrap())
                .unwrap();
            builder
                .append_extension(OsslKu::new().critical().key_cert_sign().crl_sign().build().unwrap())
                .unwrap();
        }
        builder.sign(key, MessageDigest::sha256()).unwrap();
        builder.build().to_der().unwrap()
    }

    fn rsa_key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    #[test]
    fn test_decode_certificate_fields() {
        let der = build(&rsa_key(), true);
        let cert = SignedCertificate::from_der(&der).unwrap();

        assert_eq!(cert.tbs.version, 2);
        assert_eq!(cert.serial_number(), &BigInt::from(0xC0FFEEu32));
        assert_eq!(cert.subject().common_name(), Some("Unit Test CA"));
        assert_eq!(cert.issuer().get(oid::AT_COUNTRY), Some("CZ"));
        assert!(cert.tbs.is_self_issued());
        assert_eq!(
            cert.validity().not_before.at(),
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(cert.signature_algorithm.oid, oid::SHA256_WITH_RSA);
        assert_eq!(cert.signature_algorithm.name(), "SHA256withRSA");
        assert_eq!(cert.signature.len(), 256);

        let rsa = cert.tbs.pub_key.rsa.as_ref().unwrap();
        assert_eq!(rsa.exponent, BigUint::from(65537u32));
        assert_eq!(rsa.modulus.bits(), 2048);

        let bc = cert.tbs.basic_constraints().unwrap();
        assert!(bc.is_ca);
        assert_eq!(bc.max_path_len, Some(0));
        let usage = cert.tbs.key_usage().unwrap();
        assert!(usage.key_cert_sign && usage.crl_sign && !usage.digital_signature);
    }

    #[test]
    fn test_reencoding_is_exact() {
        for with_extensions in [true, false] {
            let der = build(&rsa_key(), with_extensions);
            let cert = SignedCertificate::from_der(&der).unwrap();
            assert_eq!(cert.to_der(), der);
            assert_eq!(cert.raw_der(), der.as_slice());

            let again = SignedCertificate::from_der(&cert.to_der()).unwrap();
            assert_eq!(again, cert);
            assert_eq!(Certificate::from_der(&cert.tbs.to_der()).unwrap(), cert.tbs);
        }
    }

    #[test]
    fn test_non_rsa_key_decodes_structurally() {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
        let der = build(&key, false);

        let cert = SignedCertificate::from_der(&der).unwrap();
        assert!(cert.tbs.pub_key.rsa.is_none());
        assert_eq!(cert.signature_algorithm.oid, "1.2.840.10045.4.3.2");
        assert_eq!(cert.to_der(), der);
    }

    #[test]
    fn test_truncated_certificate_rejected() {
        let der = build(&rsa_key(), false);
        let err = SignedCertificate::from_der(&der[..der.len() - 10]).unwrap_err();
        assert!(matches!(err, Asn1Error::MalformedEncoding { .. }));

        let mut trailing = der.clone();
        trailing.push(0x00);
        assert!(SignedCertificate::from_der(&trailing).is_err());
    }

    #[test]
    fn test_certificate_id() {
        let cert = SignedCertificate::from_der(&build(&rsa_key(), false)).unwrap();
        let id = cert.id();
        assert_eq!(id.issuer, *cert.issuer());
        assert_eq!(id.to_string(), "CN=Unit Test CA, C=CZ, O=Test Organisation #c0ffee");
        assert_eq!(cert.serial_magnitude(), BigUint::from(0xC0FFEEu32));
    }
}
