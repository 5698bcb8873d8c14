use num_bigint::BigInt;
use tracing::debug;

use super::SignerInfo;
use crate::asn1::{Asn1Error, Asn1Result, Oid, Reader, Tlv, oid, tag};
use crate::x509::{AlgorithmIdentifier, Name, SignedCertificate};

/// Decoded PKCS#7 / CMS SignedData envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub version: i64,
    pub digest_algorithms: Vec<AlgorithmIdentifier>,
    /// Type of the encapsulated content (`data`, `id-ct-TSTInfo`, ...)
    pub content_type: Oid,
    /// Encapsulated content with constructed OCTET STRING fragments joined.
    /// Empty when the signature is detached.
    pub content: Vec<u8>,
    pub certificates: Vec<SignedCertificate>,
    /// CRLs carried in the envelope, as encoded
    pub crls: Vec<Vec<u8>>,
    pub signer_infos: Vec<SignerInfo>,
}

impl SignedMessage {
    /// Decode a ContentInfo wrapping SignedData.
    pub fn from_der(data: &[u8]) -> Asn1Result<Self> {
        let outer = Tlv::parse_exact(data, "contentInfo")?;
        if outer.tag != tag::SEQUENCE {
            return Err(Asn1Error::malformed(
                "contentInfo",
                format!("Expected SEQUENCE, found 0x{:02X}", outer.tag),
            ));
        }
        let mut info = outer.reader("contentInfo");
        let content_type = info.oid("contentInfo.contentType")?;
        if content_type != oid::PKCS7_SIGNED_DATA {
            return Err(Asn1Error::malformed(
                "contentInfo.contentType",
                format!("Expected signedData, found {content_type}"),
            ));
        }
        let mut explicit = info
            .explicit(0, "contentInfo.content")?
            .ok_or_else(|| Asn1Error::malformed("contentInfo.content", "Missing content"))?;
        let signed_data = explicit.read(tag::SEQUENCE, "signedData")?;
        explicit.finish()?;
        info.finish()?;

        Self::decode_signed_data(&signed_data)
    }

    fn decode_signed_data(tlv: &Tlv<'_>) -> Asn1Result<Self> {
        let mut seq = tlv.reader("signedData");
        let version = seq.small_integer("signedData.version")?;

        let mut digest_set = seq.set("signedData.digestAlgorithms")?;
        let mut digest_algorithms = Vec::new();
        while !digest_set.is_empty() {
            digest_algorithms.push(AlgorithmIdentifier::read(
                &mut digest_set,
                "signedData.digestAlgorithms",
            )?);
        }

        let mut encap = seq.sequence("signedData.contentInfo")?;
        let content_type = encap.oid("signedData.contentInfo.contentType")?;
        let content = match encap.explicit(0, "signedData.contentInfo.content")? {
            Some(mut inner) => {
                let content = inner.octet_string("signedData.contentInfo.content")?;
                inner.finish()?;
                content
            }
            None => Vec::new(),
        };
        encap.finish()?;

        let mut certificates = Vec::new();
        if let Some(set) = seq.read_optional(tag::context_constructed(0), "signedData.certificates")? {
            let mut reader = set.reader("signedData.certificates");
            while !reader.is_empty() {
                let choice = reader.read_any("signedData.certificates")?;
                if choice.tag == tag::SEQUENCE {
                    certificates.push(SignedCertificate::decode(&choice)?);
                } else {
                    debug!(
                        "Skipping certificate choice with tag 0x{:02X} in SignedData",
                        choice.tag
                    );
                }
            }
        }

        let mut crls = Vec::new();
        if let Some(set) = seq.read_optional(tag::context_constructed(1), "signedData.crls")? {
            let mut reader = set.reader("signedData.crls");
            while !reader.is_empty() {
                crls.push(reader.read_any("signedData.crls")?.raw.to_vec());
            }
        }

        let mut signer_set = seq.set("signedData.signerInfos")?;
        let mut signer_infos = Vec::new();
        while !signer_set.is_empty() {
            signer_infos.push(SignerInfo::read(&mut signer_set)?);
        }
        seq.finish()?;

        debug!(
            "Decoded SignedData: {} bytes of content, {} certificates, {} signers",
            content.len(),
            certificates.len(),
            signer_infos.len()
        );

        Ok(Self {
            version,
            digest_algorithms,
            content_type,
            content,
            certificates,
            crls,
            signer_infos,
        })
    }

    /// Embedded certificate with the given issuer and serial number
    pub fn find_certificate(&self, issuer: &Name, serial: &BigInt) -> Option<&SignedCertificate> {
        self.certificates
            .iter()
            .find(|cert| cert.serial_number() == serial && cert.issuer() == issuer)
    }

    /// Identifiers of the digest algorithms listed in the envelope
    pub fn digest_algorithm_oids(&self) -> Vec<&Oid> {
        self.digest_algorithms.iter().map(|alg| &alg.oid).collect()
    }
}
