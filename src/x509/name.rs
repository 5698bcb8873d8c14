use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::asn1::{Asn1Error, Asn1Result, Encoder, Oid, Reader, Tlv, oid, tag};

/// One attribute of a relative distinguished name, kept with its original string type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub oid: Oid,
    /// String type tag (UTF8String, PrintableString, ...)
    pub tag: u8,
    /// Content octets as encoded
    pub bytes: Vec<u8>,
}

impl AttributeValue {
    /// Decoded string value
    pub fn value(&self) -> String {
        decode_string(self.tag, &self.bytes)
    }
}

/// Issuer or subject distinguished name.
///
/// Two names are equal when they carry the same attribute type to value mapping,
/// regardless of the order or string types used in the encoding.
#[derive(Debug, Clone, Default)]
pub struct Name {
    rdns: Vec<Vec<AttributeValue>>,
    attributes: BTreeMap<Oid, String>,
}

impl Name {
    /// Build a name with one attribute per RDN, in the given order.
    pub fn from_attributes<'a>(
        attributes: impl IntoIterator<Item = (&'static str, &'a str)>,
    ) -> Self {
        let rdns = attributes
            .into_iter()
            .map(|(attr_oid, value)| {
                let tag = if attr_oid == oid::AT_COUNTRY {
                    tag::PRINTABLE_STRING
                } else {
                    tag::UTF8_STRING
                };
                vec![AttributeValue {
                    oid: Oid::from(attr_oid),
                    tag,
                    bytes: value.as_bytes().to_vec(),
                }]
            })
            .collect();
        Self::from_rdns(rdns)
    }

    fn from_rdns(rdns: Vec<Vec<AttributeValue>>) -> Self {
        let mut attributes: BTreeMap<Oid, String> = BTreeMap::new();
        for attr in rdns.iter().flatten() {
            let value = attr.value();
            attributes
                .entry(attr.oid.clone())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        Self { rdns, attributes }
    }

    /// Decode a Name from its complete DER encoding.
    pub fn from_der(data: &[u8]) -> Asn1Result<Self> {
        let tlv = Tlv::parse_exact(data, "name")?;
        Self::decode(&tlv, "name")
    }

    /// Decode a `Name` element (SEQUENCE OF SET OF AttributeTypeAndValue).
    pub(crate) fn decode(tlv: &Tlv<'_>, field: &'static str) -> Asn1Result<Self> {
        if tlv.tag != tag::SEQUENCE {
            return Err(Asn1Error::malformed(
                field,
                format!("Expected SEQUENCE, found 0x{:02X}", tlv.tag),
            ));
        }

        let mut rdns = Vec::new();
        let mut seq = tlv.reader(field);
        while !seq.is_empty() {
            let mut set = seq.set(field)?;
            let mut rdn = Vec::new();
            while !set.is_empty() {
                let mut atv = set.sequence(field)?;
                let attr_oid = atv.oid(field)?;
                let value = atv.read_any(field)?;
                atv.finish()?;
                rdn.push(AttributeValue {
                    oid: attr_oid,
                    tag: value.tag,
                    bytes: value.value.to_vec(),
                });
            }
            rdns.push(rdn);
        }
        Ok(Self::from_rdns(rdns))
    }

    pub(crate) fn read(reader: &mut Reader<'_>, field: &'static str) -> Asn1Result<Self> {
        let tlv = reader.read(tag::SEQUENCE, field)?;
        Self::decode(&tlv, field)
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.constructed(tag::SEQUENCE, |seq| {
            for rdn in &self.rdns {
                seq.constructed(tag::SET, |set| {
                    for attr in rdn {
                        set.constructed(tag::SEQUENCE, |atv| {
                            atv.oid(&attr.oid);
                            atv.tlv(attr.tag, &attr.bytes);
                        });
                    }
                });
            }
        });
    }

    pub fn to_der(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        self.encode(&mut enc);
        enc.finish()
    }

    /// Value of the given attribute type
    pub fn get(&self, attr_oid: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| *key == attr_oid)
            .map(|(_, value)| value.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get(oid::AT_COMMON_NAME)
    }

    pub fn attributes(&self) -> &BTreeMap<Oid, String> {
        &self.attributes
    }

    /// Relative distinguished names in encoding order
    pub fn rdns(&self) -> &[Vec<AttributeValue>] {
        &self.rdns
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attributes.hash(state);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (attr_oid, value)) in self.attributes.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match attr_oid.short_name() {
                Some(short) => write!(f, "{short}={value}")?,
                None => write!(f, "{attr_oid}={value}")?,
            }
        }
        Ok(())
    }
}

/// Decode the content octets of an ASN.1 character string.
pub(crate) fn decode_string(string_tag: u8, bytes: &[u8]) -> String {
    match string_tag {
        tag::UTF8_STRING
        | tag::PRINTABLE_STRING
        | tag::IA5_STRING
        | tag::VISIBLE_STRING => String::from_utf8_lossy(bytes).into_owned(),
        // Teletex is close enough to Latin-1 for the names seen in practice
        tag::T61_STRING => bytes.iter().map(|&b| b as char).collect(),
        tag::BMP_STRING => {
            let units: Vec<u16> = bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                    _ => 0xFFFD,
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
        tag::UNIVERSAL_STRING => bytes
            .chunks(4)
            .map(|quad| match quad {
                [a, b, c, d] => char::from_u32(u32::from_be_bytes([*a, *b, *c, *d]))
                    .unwrap_or(char::REPLACEMENT_CHARACTER),
                _ => char::REPLACEMENT_CHARACTER,
            })
            .collect(),
        _ => format!("#{}", hex::encode(bytes)),
    }
}
