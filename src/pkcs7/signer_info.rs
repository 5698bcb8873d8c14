use chrono::{DateTime, Utc};
use num_bigint::BigInt;

use crate::asn1::{Asn1Error, Asn1Result, Oid, Reader, Tlv, encode_tlv, oid, tag};
use crate::x509::{AlgorithmIdentifier, Asn1Time, CertificateId, Name};

/// One signed or unsigned attribute. Values are kept as complete encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: Oid,
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    fn read(reader: &mut Reader<'_>, field: &'static str) -> Asn1Result<Self> {
        let mut seq = reader.sequence(field)?;
        let attr_type = seq.oid(field)?;
        let mut set = seq.set(field)?;
        seq.finish()?;

        let mut values = Vec::new();
        while !set.is_empty() {
            values.push(set.read_any(field)?.raw.to_vec());
        }
        Ok(Self { attr_type, values })
    }

    pub fn first_value(&self) -> Option<&[u8]> {
        self.values.first().map(Vec::as_slice)
    }
}

fn read_attributes(tlv: &Tlv<'_>, field: &'static str) -> Asn1Result<Vec<Attribute>> {
    let mut reader = tlv.reader(field);
    let mut attributes = Vec::new();
    while !reader.is_empty() {
        attributes.push(Attribute::read(&mut reader, field)?);
    }
    Ok(attributes)
}

/// SignerInfo identified by issuer and serial number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfo {
    pub version: i64,
    pub issuer: Name,
    pub serial_number: BigInt,
    pub digest_algorithm: AlgorithmIdentifier,
    pub auth_attributes: Option<Vec<Attribute>>,
    pub encrypt_algorithm: AlgorithmIdentifier,
    pub signature: Vec<u8>,
    pub unauth_attributes: Option<Vec<Attribute>>,
    auth_attributes_content: Option<Vec<u8>>,
}

impl SignerInfo {
    pub(crate) fn read(reader: &mut Reader<'_>) -> Asn1Result<Self> {
        const FIELD: &str = "signerInfo";

        let mut seq = reader.sequence(FIELD)?;
        let version = seq.small_integer("signerInfo.version")?;

        if seq.peek_tag() == Some(tag::context(0)) {
            return Err(Asn1Error::unsupported(
                "signerInfo.sid",
                "Signer identified by subject key identifier",
            ));
        }
        let mut sid = seq.sequence("signerInfo.issuerAndSerialNumber")?;
        let issuer = Name::read(&mut sid, "signerInfo.issuerAndSerialNumber.issuer")?;
        let serial_number = sid.integer("signerInfo.issuerAndSerialNumber.serialNumber")?;
        sid.finish()?;

        let digest_algorithm = AlgorithmIdentifier::read(&mut seq, "signerInfo.digestAlgorithm")?;

        let (auth_attributes, auth_attributes_content) =
            match seq.read_optional(tag::context_constructed(0), "signerInfo.authenticatedAttributes")? {
                Some(tlv) => (
                    Some(read_attributes(&tlv, "signerInfo.authenticatedAttributes")?),
                    Some(tlv.value.to_vec()),
                ),
                None => (None, None),
            };

        let encrypt_algorithm =
            AlgorithmIdentifier::read(&mut seq, "signerInfo.digestEncryptionAlgorithm")?;
        let signature = seq.octet_string("signerInfo.encryptedDigest")?;

        let unauth_attributes = seq
            .read_optional(tag::context_constructed(1), "signerInfo.unauthenticatedAttributes")?
            .map(|tlv| read_attributes(&tlv, "signerInfo.unauthenticatedAttributes"))
            .transpose()?;
        seq.finish()?;

        Ok(Self {
            version,
            issuer,
            serial_number,
            digest_algorithm,
            auth_attributes,
            encrypt_algorithm,
            signature,
            unauth_attributes,
            auth_attributes_content,
        })
    }

    /// Identity of the certificate holding the signer's key
    pub fn signer_id(&self) -> CertificateId {
        CertificateId::new(self.issuer.clone(), self.serial_number.clone())
    }

    /// Authenticated attributes re-tagged as a SET OF, the form that is signed
    pub fn signed_attributes_der(&self) -> Option<Vec<u8>> {
        self.auth_attributes_content
            .as_deref()
            .map(|content| encode_tlv(tag::SET, content))
    }

    pub fn auth_attribute(&self, attr_type: &str) -> Option<&Attribute> {
        self.auth_attributes
            .as_ref()?
            .iter()
            .find(|attr| attr.attr_type == attr_type)
    }

    pub fn unauth_attribute(&self, attr_type: &str) -> Option<&Attribute> {
        self.unauth_attributes
            .as_ref()?
            .iter()
            .find(|attr| attr.attr_type == attr_type)
    }

    /// Value of the `messageDigest` authenticated attribute
    pub fn message_digest(&self) -> Asn1Result<Option<Vec<u8>>> {
        const FIELD: &str = "signerInfo.authenticatedAttributes.messageDigest";

        let Some(value) = self
            .auth_attribute(oid::ATTR_MESSAGE_DIGEST)
            .and_then(Attribute::first_value)
        else {
            return Ok(None);
        };
        let mut reader = Reader::new(value, FIELD);
        let digest = reader.octet_string(FIELD)?;
        reader.finish()?;
        Ok(Some(digest))
    }

    /// Value of the `contentType` authenticated attribute
    pub fn content_type(&self) -> Asn1Result<Option<Oid>> {
        const FIELD: &str = "signerInfo.authenticatedAttributes.contentType";

        let Some(value) = self
            .auth_attribute(oid::ATTR_CONTENT_TYPE)
            .and_then(Attribute::first_value)
        else {
            return Ok(None);
        };
        let mut reader = Reader::new(value, FIELD);
        let content_type = reader.oid(FIELD)?;
        reader.finish()?;
        Ok(Some(content_type))
    }

    /// Value of the `signingTime` authenticated attribute
    pub fn signing_time(&self) -> Asn1Result<Option<DateTime<Utc>>> {
        const FIELD: &str = "signerInfo.authenticatedAttributes.signingTime";

        let Some(value) = self
            .auth_attribute(oid::ATTR_SIGNING_TIME)
            .and_then(Attribute::first_value)
        else {
            return Ok(None);
        };
        let tlv = Tlv::parse_exact(value, FIELD)?;
        Ok(Some(Asn1Time::decode(&tlv, FIELD)?.at()))
    }
}
