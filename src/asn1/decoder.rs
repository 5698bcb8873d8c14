use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::{Asn1Error, Asn1Result, Oid, tag};

// Nesting limit for BER indefinite-length values
const MAX_INDEFINITE_DEPTH: usize = 32;

/// Decode a DER length field starting at `data[0]`.
///
/// Returns `(length, consumed)` where `consumed` counts the length octets only.
/// The indefinite form (`0x80`) is rejected with `UnsupportedEncoding`.
pub fn decode_length(data: &[u8]) -> Asn1Result<(usize, usize)> {
    const FIELD: &str = "length";

    let Some(&first) = data.first() else {
        return Err(Asn1Error::malformed(FIELD, "No length byte"));
    };
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 {
        return Err(Asn1Error::unsupported(
            FIELD,
            "Indefinite length form, expecting definite length",
        ));
    }
    if count > size_of::<usize>() {
        return Err(Asn1Error::unsupported(
            FIELD,
            format!("Length encoded on {count} bytes"),
        ));
    }
    if data.len() < 1 + count {
        return Err(Asn1Error::malformed(
            FIELD,
            "Insufficient data for long length",
        ));
    }

    let length = data[1..=count]
        .iter()
        .fold(0usize, |acc, &byte| (acc << 8) | byte as usize);
    Ok((length, 1 + count))
}

/// One decoded tag/length/value element borrowing from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    /// Content octets, without the end-of-contents marker of indefinite encodings
    pub value: &'a [u8],
    /// The complete encoding, header included
    pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Decode the first element of `data`.
    pub fn parse(data: &'a [u8], field: &'static str) -> Asn1Result<Self> {
        read_tlv(data, field, 0)
    }

    /// Decode `data` as exactly one element.
    pub fn parse_exact(data: &'a [u8], field: &'static str) -> Asn1Result<Self> {
        let tlv = Self::parse(data, field)?;
        if tlv.raw.len() != data.len() {
            return Err(Asn1Error::malformed(field, "Unexpected trailing data"));
        }
        Ok(tlv)
    }

    pub fn is_constructed(&self) -> bool {
        self.tag & tag::CONSTRUCTED != 0
    }

    /// Reader over the content octets of a constructed element
    pub fn reader(&self, field: &'static str) -> Reader<'a> {
        Reader::new(self.value, field)
    }

    /// Interpret the content octets as an INTEGER, whatever the tag.
    pub fn as_integer(&self, field: &'static str) -> Asn1Result<BigInt> {
        if self.value.is_empty() {
            return Err(Asn1Error::malformed(field, "Empty integer"));
        }
        Ok(BigInt::from_signed_bytes_be(self.value))
    }

    /// Interpret the content octets as a BIT STRING, whatever the tag.
    pub fn as_bit_string(&self, field: &'static str) -> Asn1Result<BitString> {
        BitString::from_der_value(self.value, field)
    }

    /// Interpret the element as an OCTET STRING, reassembling constructed fragments.
    pub fn as_octet_string(&self, field: &'static str) -> Asn1Result<Vec<u8>> {
        if !self.is_constructed() {
            return Ok(self.value.to_vec());
        }
        let mut out = Vec::with_capacity(self.value.len());
        let mut fragments = self.reader(field);
        while !fragments.is_empty() {
            let fragment = fragments.read_any(field)?;
            match fragment.tag {
                tag::OCTET_STRING | tag::OCTET_STRING_CONSTRUCTED => {
                    out.extend_from_slice(&fragment.as_octet_string(field)?);
                }
                other => {
                    return Err(Asn1Error::malformed(
                        field,
                        format!("Unexpected tag 0x{other:02X} in constructed octet string"),
                    ));
                }
            }
        }
        Ok(out)
    }

    pub fn as_oid(&self, field: &'static str) -> Asn1Result<Oid> {
        Oid::from_der_value(self.value, field)
    }

    pub fn as_boolean(&self, field: &'static str) -> Asn1Result<bool> {
        match self.value {
            [byte] => Ok(*byte != 0),
            _ => Err(Asn1Error::malformed(field, "Boolean must be one byte")),
        }
    }
}

fn read_tlv<'a>(data: &'a [u8], field: &'static str, depth: usize) -> Asn1Result<Tlv<'a>> {
    let Some(&tag) = data.first() else {
        return Err(Asn1Error::malformed(field, "Unexpected end of data"));
    };
    if tag & 0x1F == 0x1F {
        return Err(Asn1Error::unsupported(field, "High tag number form"));
    }

    if data.get(1) == Some(&0x80) {
        if tag & tag::CONSTRUCTED == 0 {
            return Err(Asn1Error::malformed(
                field,
                "Indefinite length on a primitive value",
            ));
        }
        if depth >= MAX_INDEFINITE_DEPTH {
            return Err(Asn1Error::unsupported(
                field,
                "Indefinite length values nested too deeply",
            ));
        }
        let content = &data[2..];
        let content_len = indefinite_content_len(content, field, depth + 1)?;
        return Ok(Tlv {
            tag,
            value: &content[..content_len],
            raw: &data[..2 + content_len + 2],
        });
    }

    let (length, consumed) = decode_length(&data[1..]).map_err(|e| e.within(field))?;
    let start = 1 + consumed;
    let end = start
        .checked_add(length)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            Asn1Error::malformed(field, format!("Length {length} exceeds available data"))
        })?;

    Ok(Tlv {
        tag,
        value: &data[start..end],
        raw: &data[..end],
    })
}

// Length of the content preceding the end-of-contents octets
fn indefinite_content_len(content: &[u8], field: &'static str, depth: usize) -> Asn1Result<usize> {
    let mut offset = 0;
    loop {
        let rest = &content[offset..];
        if rest.starts_with(&[0x00, 0x00]) {
            return Ok(offset);
        }
        if rest.is_empty() {
            return Err(Asn1Error::malformed(field, "Missing end-of-contents"));
        }
        offset += read_tlv(rest, field, depth)?.raw.len();
    }
}

/// Sequential reader over the content of a constructed value.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    field: &'static str,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], field: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            field,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.remaining().first().copied()
    }

    /// Read the next element whatever its tag.
    pub fn read_any(&mut self, field: &'static str) -> Asn1Result<Tlv<'a>> {
        let tlv = read_tlv(self.remaining(), field, 0)?;
        self.pos += tlv.raw.len();
        Ok(tlv)
    }

    /// Read the next element, which must carry `expected`.
    pub fn read(&mut self, expected: u8, field: &'static str) -> Asn1Result<Tlv<'a>> {
        match self.peek_tag() {
            Some(found) if found == expected => self.read_any(field),
            Some(found) => Err(Asn1Error::malformed(
                field,
                format!("Expected tag 0x{expected:02X}, found 0x{found:02X}"),
            )),
            None => Err(Asn1Error::malformed(field, "Unexpected end of data")),
        }
    }

    /// Read the next element only if it carries `expected`.
    pub fn read_optional(
        &mut self,
        expected: u8,
        field: &'static str,
    ) -> Asn1Result<Option<Tlv<'a>>> {
        if self.peek_tag() == Some(expected) {
            self.read_any(field).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn sequence(&mut self, field: &'static str) -> Asn1Result<Reader<'a>> {
        Ok(self.read(tag::SEQUENCE, field)?.reader(field))
    }

    pub fn set(&mut self, field: &'static str) -> Asn1Result<Reader<'a>> {
        Ok(self.read(tag::SET, field)?.reader(field))
    }

    /// Optional `[n] EXPLICIT` wrapper, returning a reader over its content.
    pub fn explicit(&mut self, n: u8, field: &'static str) -> Asn1Result<Option<Reader<'a>>> {
        Ok(self
            .read_optional(tag::context_constructed(n), field)?
            .map(|tlv| tlv.reader(field)))
    }

    pub fn integer(&mut self, field: &'static str) -> Asn1Result<BigInt> {
        self.read(tag::INTEGER, field)?.as_integer(field)
    }

    pub fn small_integer(&mut self, field: &'static str) -> Asn1Result<i64> {
        self.integer(field)?
            .to_i64()
            .ok_or_else(|| Asn1Error::malformed(field, "Integer out of range"))
    }

    pub fn oid(&mut self, field: &'static str) -> Asn1Result<Oid> {
        self.read(tag::OID, field)?.as_oid(field)
    }

    pub fn boolean(&mut self, field: &'static str) -> Asn1Result<bool> {
        self.read(tag::BOOLEAN, field)?.as_boolean(field)
    }

    /// OCTET STRING in primitive or constructed form
    pub fn octet_string(&mut self, field: &'static str) -> Asn1Result<Vec<u8>> {
        match self.peek_tag() {
            Some(tag::OCTET_STRING_CONSTRUCTED) => self.read_any(field)?.as_octet_string(field),
            _ => Ok(self.read(tag::OCTET_STRING, field)?.value.to_vec()),
        }
    }

    pub fn bit_string(&mut self, field: &'static str) -> Asn1Result<BitString> {
        self.read(tag::BIT_STRING, field)?.as_bit_string(field)
    }

    /// Fail if anything is left unread.
    pub fn finish(&self) -> Asn1Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Asn1Error::malformed(
                self.field,
                format!("{} bytes of unexpected trailing data", self.remaining().len()),
            ))
        }
    }
}

/// BIT STRING value: unused bit count of the last byte plus the bytes themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitString {
    pub unused_bits: u8,
    pub bytes: Vec<u8>,
}

impl BitString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            unused_bits: 0,
            bytes: bytes.into(),
        }
    }

    pub fn from_der_value(value: &[u8], field: &'static str) -> Asn1Result<Self> {
        let Some((&unused_bits, bytes)) = value.split_first() else {
            return Err(Asn1Error::malformed(field, "Empty bit string"));
        };
        if unused_bits > 7 || (bytes.is_empty() && unused_bits != 0) {
            return Err(Asn1Error::malformed(
                field,
                format!("Invalid unused bit count {unused_bits}"),
            ));
        }
        Ok(Self {
            unused_bits,
            bytes: bytes.to_vec(),
        })
    }

    /// Named bit `index`, counting from the most significant bit of the first byte
    pub fn bit(&self, index: usize) -> bool {
        if index >= self.len_bits() {
            return false;
        }
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    pub fn len_bits(&self) -> usize {
        (self.bytes.len() * 8).saturating_sub(self.unused_bits as usize)
    }
}
