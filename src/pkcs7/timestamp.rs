use chrono::{DateTime, TimeDelta, Utc};
use num_bigint::BigInt;
use tracing::debug;

use super::SignedMessage;
use crate::asn1::{Asn1Error, Asn1Result, Oid, Reader, Tlv, oid, tag};
use crate::x509::{AlgorithmIdentifier, Asn1Time, Extension, Name, SignedCertificate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageImprint {
    pub algorithm: AlgorithmIdentifier,
    pub digest: Vec<u8>,
}

/// Accuracy of `genTime`; absent parts count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accuracy {
    pub seconds: Option<i64>,
    pub millis: Option<i64>,
    pub micros: Option<i64>,
}

impl Accuracy {
    /// Total accuracy, `None` when it does not fit a [`TimeDelta`]
    pub fn as_duration(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.seconds.unwrap_or(0))?
            .checked_add(&TimeDelta::try_milliseconds(self.millis.unwrap_or(0))?)?
            .checked_add(&TimeDelta::microseconds(self.micros.unwrap_or(0)))
    }
}

/// RFC 3161 TSTInfo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TstInfo {
    pub version: i64,
    pub policy: Oid,
    pub msg_imprint: MessageImprint,
    pub serial_number: BigInt,
    pub gen_time: Asn1Time,
    pub accuracy: Option<Accuracy>,
    pub ordering: bool,
    pub nonce: Option<BigInt>,
    /// Directory name of the TSA when given in the token
    pub tsa: Option<Name>,
    pub extensions: Vec<Extension>,
}

impl TstInfo {
    pub fn from_der(data: &[u8]) -> Asn1Result<Self> {
        let mut outer = Reader::new(data, "tstInfo");
        let mut seq = outer.sequence("tstInfo")?;
        outer.finish()?;

        let version = seq.small_integer("tstInfo.version")?;
        let policy = seq.oid("tstInfo.policy")?;

        let mut imprint = seq.sequence("tstInfo.messageImprint")?;
        let algorithm = AlgorithmIdentifier::read(&mut imprint, "tstInfo.messageImprint.hashAlgorithm")?;
        let digest = imprint.octet_string("tstInfo.messageImprint.hashedMessage")?;
        imprint.finish()?;

        let serial_number = seq.integer("tstInfo.serialNumber")?;
        let gen_time_tlv = seq.read(tag::GENERALIZED_TIME, "tstInfo.genTime")?;
        let gen_time = Asn1Time::decode(&gen_time_tlv, "tstInfo.genTime")?;

        let accuracy = seq
            .read_optional(tag::SEQUENCE, "tstInfo.accuracy")?
            .map(|tlv| read_accuracy(&tlv))
            .transpose()?;
        let ordering = match seq.read_optional(tag::BOOLEAN, "tstInfo.ordering")? {
            Some(tlv) => tlv.as_boolean("tstInfo.ordering")?,
            None => false,
        };
        let nonce = seq
            .read_optional(tag::INTEGER, "tstInfo.nonce")?
            .map(|tlv| tlv.as_integer("tstInfo.nonce"))
            .transpose()?;

        let tsa = match seq.explicit(0, "tstInfo.tsa")? {
            Some(mut general_name) => {
                let name = general_name.read_any("tstInfo.tsa")?;
                if name.tag == tag::context_constructed(4) {
                    let mut inner = name.reader("tstInfo.tsa");
                    Some(Name::read(&mut inner, "tstInfo.tsa")?)
                } else {
                    debug!("TSA named by GeneralName tag 0x{:02X}, ignoring", name.tag);
                    None
                }
            }
            None => None,
        };

        let mut extensions = Vec::new();
        if let Some(tlv) = seq.read_optional(tag::context_constructed(1), "tstInfo.extensions")? {
            let mut reader = tlv.reader("tstInfo.extensions");
            while !reader.is_empty() {
                extensions.push(Extension::read(&mut reader)?);
            }
        }
        seq.finish()?;

        Ok(Self {
            version,
            policy,
            msg_imprint: MessageImprint { algorithm, digest },
            serial_number,
            gen_time,
            accuracy,
            ordering,
            nonce,
            tsa,
            extensions,
        })
    }
}

fn read_accuracy(tlv: &Tlv<'_>) -> Asn1Result<Accuracy> {
    const FIELD: &str = "tstInfo.accuracy";

    let mut seq = tlv.reader(FIELD);
    let mut accuracy = Accuracy::default();
    let small = |tlv: Tlv<'_>| -> Asn1Result<i64> {
        i64::try_from(tlv.as_integer(FIELD)?)
            .map_err(|_| Asn1Error::malformed(FIELD, "Accuracy out of range"))
    };
    if let Some(seconds) = seq.read_optional(tag::INTEGER, FIELD)? {
        accuracy.seconds = Some(small(seconds)?);
    }
    if let Some(millis) = seq.read_optional(tag::context(0), FIELD)? {
        accuracy.millis = Some(small(millis)?);
    }
    if let Some(micros) = seq.read_optional(tag::context(1), FIELD)? {
        accuracy.micros = Some(small(micros)?);
    }
    seq.finish()?;
    Ok(accuracy)
}

/// A timestamp token: TSTInfo plus the SignedData envelope that carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampToken {
    pub info: TstInfo,
    pub envelope: SignedMessage,
}

impl TimestampToken {
    pub fn from_der(data: &[u8]) -> Asn1Result<Self> {
        let envelope = SignedMessage::from_der(data)?;
        if envelope.content_type != oid::CT_TST_INFO {
            return Err(Asn1Error::malformed(
                "signedData.contentInfo.contentType",
                format!("Expected id-ct-TSTInfo, found {}", envelope.content_type),
            ));
        }
        let info = TstInfo::from_der(&envelope.content)?;
        Ok(Self { info, envelope })
    }

    pub fn gen_time(&self) -> DateTime<Utc> {
        self.info.gen_time.at()
    }

    pub fn accuracy(&self) -> Option<Accuracy> {
        self.info.accuracy
    }

    pub fn msg_imprint(&self) -> &MessageImprint {
        &self.info.msg_imprint
    }

    pub fn tsa(&self) -> Option<&Name> {
        self.info.tsa.as_ref()
    }

    /// Certificates embedded in the token
    pub fn certificates(&self) -> &[SignedCertificate] {
        &self.envelope.certificates
    }

    pub fn certificates_contain(&self, serial: &BigInt) -> bool {
        self.certificates()
            .iter()
            .any(|cert| cert.serial_number() == serial)
    }

    /// Compare a hash advertised elsewhere against the token's message imprint
    pub fn imprint_matches(&self, digest: &[u8]) -> bool {
        self.info.msg_imprint.digest == digest
    }
}
