use num_bigint::BigInt;
use tracing::debug;

use super::extensions::read_extensions;
use super::{AlgorithmIdentifier, Asn1Time, Extension, Name};
use crate::asn1::revoked::{RevokedSerials, parse_revoked_serials};
use crate::asn1::{Asn1Error, Asn1Result, Reader, Tlv, oid, tag};

/// CRLReason codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedCertificate {
    pub serial_number: BigInt,
    pub revocation_date: Asn1Time,
    pub extensions: Vec<Extension>,
}

impl RevokedCertificate {
    /// Reason from the `reasonCode` entry extension
    pub fn reason(&self) -> Option<RevocationReason> {
        let ext = self.extensions.iter().find(|e| e.oid == oid::EXT_CRL_REASON)?;
        let mut reader = Reader::new(&ext.raw, "revokedCertificates.entry.reasonCode");
        let code = reader
            .read(tag::ENUMERATED, "revokedCertificates.entry.reasonCode")
            .ok()?;
        let code = code.as_integer("revokedCertificates.entry.reasonCode").ok()?;
        i64::try_from(code).ok().and_then(RevocationReason::from_code)
    }
}

/// Fields of a CRL preceding the revoked certificate list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlHeader {
    pub version: Option<i64>,
    pub signature_algorithm: AlgorithmIdentifier,
    pub issuer: Name,
    pub this_update: Asn1Time,
    pub next_update: Option<Asn1Time>,
}

/// A fully decoded certificate revocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRevocationList {
    pub header: CrlHeader,
    pub revoked: Vec<RevokedCertificate>,
    pub extensions: Vec<Extension>,
    pub signature_algorithm: AlgorithmIdentifier,
    pub signature: Vec<u8>,
    tbs_raw: Vec<u8>,
}

/// Header of a CRL plus the serial numbers read by the fast path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlSerials {
    pub header: CrlHeader,
    pub serials: RevokedSerials,
}

struct Envelope<'a> {
    tbs: Tlv<'a>,
    signature_algorithm: AlgorithmIdentifier,
    signature: Vec<u8>,
}

fn read_envelope(data: &[u8]) -> Asn1Result<Envelope<'_>> {
    let outer = Tlv::parse_exact(data, "certificateList")?;
    if outer.tag != tag::SEQUENCE {
        return Err(Asn1Error::malformed(
            "certificateList",
            format!("Expected SEQUENCE, found 0x{:02X}", outer.tag),
        ));
    }
    let mut seq = outer.reader("certificateList");
    let tbs = seq.read(tag::SEQUENCE, "tbsCertList")?;
    let signature_algorithm =
        AlgorithmIdentifier::read(&mut seq, "certificateList.signatureAlgorithm")?;
    let signature = seq.bit_string("certificateList.signatureValue")?;
    seq.finish()?;
    Ok(Envelope {
        tbs,
        signature_algorithm,
        signature: signature.bytes,
    })
}

fn read_header(tbs: &mut Reader<'_>) -> Asn1Result<CrlHeader> {
    let version = tbs
        .read_optional(tag::INTEGER, "tbsCertList.version")?
        .map(|tlv| tlv.as_integer("tbsCertList.version"))
        .transpose()?
        .map(|v| {
            i64::try_from(v).map_err(|_| Asn1Error::malformed("tbsCertList.version", "Out of range"))
        })
        .transpose()?;
    let signature_algorithm = AlgorithmIdentifier::read(tbs, "tbsCertList.signature")?;
    let issuer = Name::read(tbs, "tbsCertList.issuer")?;
    let this_update = Asn1Time::read(tbs, "tbsCertList.thisUpdate")?;
    let next_update = if Asn1Time::is_next(tbs) {
        Some(Asn1Time::read(tbs, "tbsCertList.nextUpdate")?)
    } else {
        None
    };
    Ok(CrlHeader {
        version,
        signature_algorithm,
        issuer,
        this_update,
        next_update,
    })
}

impl CertificateRevocationList {
    /// Decode a complete CRL with every revoked entry.
    pub fn from_der(data: &[u8]) -> Asn1Result<Self> {
        let envelope = read_envelope(data)?;
        let mut tbs = envelope.tbs.reader("tbsCertList");
        let header = read_header(&mut tbs)?;

        let mut revoked = Vec::new();
        if let Some(list) = tbs.read_optional(tag::SEQUENCE, "tbsCertList.revokedCertificates")? {
            let mut entries = list.reader("tbsCertList.revokedCertificates");
            while !entries.is_empty() {
                revoked.push(read_revoked_entry(&mut entries)?);
            }
        }
        let extensions = match tbs.explicit(0, "tbsCertList.crlExtensions")? {
            Some(mut inner) => read_extensions(&mut inner, "tbsCertList.crlExtensions")?,
            None => Vec::new(),
        };
        tbs.finish()?;

        debug!(
            "Decoded CRL of {} with {} revoked entries",
            header.issuer,
            revoked.len()
        );
        Ok(Self {
            header,
            revoked,
            extensions,
            signature_algorithm: envelope.signature_algorithm,
            signature: envelope.signature,
            tbs_raw: envelope.tbs.raw.to_vec(),
        })
    }

    /// Decode the header and only the serial numbers of revoked entries.
    ///
    /// The revoked list goes through the fail-soft fast path: a malformed entry
    /// ends the list and is reported in `serials.diagnostics`.
    pub fn serials_from_der(data: &[u8]) -> Asn1Result<CrlSerials> {
        let envelope = read_envelope(data)?;
        let mut tbs = envelope.tbs.reader("tbsCertList");
        let header = read_header(&mut tbs)?;

        let serials = match tbs.read_optional(tag::SEQUENCE, "tbsCertList.revokedCertificates")? {
            Some(list) => parse_revoked_serials(list.value),
            None => RevokedSerials::default(),
        };
        Ok(CrlSerials { header, serials })
    }

    /// Raw bytes of the `revokedCertificates` content, for deferred fast-path parsing
    pub fn revoked_list_bytes(data: &[u8]) -> Asn1Result<(CrlHeader, Vec<u8>)> {
        let envelope = read_envelope(data)?;
        let mut tbs = envelope.tbs.reader("tbsCertList");
        let header = read_header(&mut tbs)?;
        let list = tbs
            .read_optional(tag::SEQUENCE, "tbsCertList.revokedCertificates")?
            .map(|tlv| tlv.value.to_vec())
            .unwrap_or_default();
        Ok((header, list))
    }

    pub fn issuer(&self) -> &Name {
        &self.header.issuer
    }

    /// Encoded tbsCertList as received, the bytes covered by the signature
    pub fn tbs_der(&self) -> &[u8] {
        &self.tbs_raw
    }

    pub fn find(&self, serial: &BigInt) -> Option<&RevokedCertificate> {
        self.revoked.iter().find(|entry| &entry.serial_number == serial)
    }
}

fn read_revoked_entry(entries: &mut Reader<'_>) -> Asn1Result<RevokedCertificate> {
    const FIELD: &str = "revokedCertificates.entry";

    let mut entry = entries.sequence(FIELD)?;
    let serial_number = entry.integer("revokedCertificates.entry.userCertificate")?;
    let revocation_date = Asn1Time::read(&mut entry, "revokedCertificates.entry.revocationDate")?;
    let extensions = if entry.is_empty() {
        Vec::new()
    } else {
        read_extensions(&mut entry, "revokedCertificates.entry.crlEntryExtensions")?
    };
    entry.finish()?;
    Ok(RevokedCertificate {
        serial_number,
        revocation_date,
        extensions,
    })
}
