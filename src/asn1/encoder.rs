use num_bigint::BigInt;

use super::{BitString, Oid, tag};

/// Append a DER definite length to `out`.
pub fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

/// Encode a single element.
pub fn encode_tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 6);
    out.push(tag);
    encode_length(value.len(), &mut out);
    out.extend_from_slice(value);
    out
}

/// Canonical DER writer.
///
/// ```
/// use databox_verify::asn1::{Encoder, tag};
///
/// let mut enc = Encoder::new();
/// enc.constructed(tag::SEQUENCE, |seq| {
///     seq.small_integer(2);
/// });
/// assert_eq!(enc.finish(), vec![0x30, 0x03, 0x02, 0x01, 0x02]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already encoded element.
    pub fn raw(&mut self, encoded: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(encoded);
        self
    }

    pub fn tlv(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.buf.push(tag);
        encode_length(value.len(), &mut self.buf);
        self.buf.extend_from_slice(value);
        self
    }

    /// Encode a constructed element whose content is produced by `build`.
    pub fn constructed(&mut self, tag: u8, build: impl FnOnce(&mut Encoder)) -> &mut Self {
        let mut inner = Encoder::new();
        build(&mut inner);
        self.tlv(tag, &inner.buf)
    }

    pub fn integer(&mut self, value: &BigInt) -> &mut Self {
        self.tlv(tag::INTEGER, &value.to_signed_bytes_be())
    }

    pub fn small_integer(&mut self, value: i64) -> &mut Self {
        self.integer(&BigInt::from(value))
    }

    /// INTEGER from big-endian magnitude bytes (treated as unsigned)
    pub fn unsigned_integer(&mut self, magnitude: &[u8]) -> &mut Self {
        let trimmed: Vec<u8> = match magnitude.iter().position(|&b| b != 0) {
            Some(first) => magnitude[first..].to_vec(),
            None => vec![0],
        };
        if trimmed[0] & 0x80 != 0 {
            let mut padded = Vec::with_capacity(trimmed.len() + 1);
            padded.push(0);
            padded.extend_from_slice(&trimmed);
            self.tlv(tag::INTEGER, &padded)
        } else {
            self.tlv(tag::INTEGER, &trimmed)
        }
    }

    pub fn oid(&mut self, oid: &Oid) -> &mut Self {
        self.tlv(tag::OID, &oid.to_der_value())
    }

    pub fn boolean(&mut self, value: bool) -> &mut Self {
        self.tlv(tag::BOOLEAN, &[if value { 0xFF } else { 0x00 }])
    }

    pub fn null(&mut self) -> &mut Self {
        self.tlv(tag::NULL, &[])
    }

    pub fn octet_string(&mut self, value: &[u8]) -> &mut Self {
        self.tlv(tag::OCTET_STRING, value)
    }

    pub fn bit_string(&mut self, value: &BitString) -> &mut Self {
        self.bit_string_tagged(tag::BIT_STRING, value)
    }

    /// BIT STRING under an implicit tag
    pub fn bit_string_tagged(&mut self, tag: u8, value: &BitString) -> &mut Self {
        let mut content = Vec::with_capacity(value.bytes.len() + 1);
        content.push(value.unused_bits);
        content.extend_from_slice(&value.bytes);
        self.tlv(tag, &content)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::decode_length;

    #[test]
    fn test_encode_length_forms() {
        let mut out = Vec::new();
        encode_length(5, &mut out);
        assert_eq!(out, vec![0x05]);

        out.clear();
        encode_length(255, &mut out);
        assert_eq!(out, vec![0x81, 0xFF]);

        out.clear();
        encode_length(0x1234, &mut out);
        assert_eq!(out, vec![0x82, 0x12, 0x34]);
        assert_eq!(decode_length(&out).unwrap(), (0x1234, 3));
    }

    #[test]
    fn test_integer_encoding_is_minimal() {
        let mut enc = Encoder::new();
        enc.small_integer(128).small_integer(-1).small_integer(0);
        assert_eq!(
            enc.finish(),
            vec![0x02, 0x02, 0x00, 0x80, 0x02, 0x01, 0xFF, 0x02, 0x01, 0x00]
        );
    }

    #[test]
    fn test_unsigned_integer_padding() {
        let mut enc = Encoder::new();
        enc.unsigned_integer(&[0x00, 0x00, 0xC3, 0x01]);
        assert_eq!(enc.finish(), vec![0x02, 0x03, 0x00, 0xC3, 0x01]);
    }

    #[test]
    fn test_long_content() {
        let mut enc = Encoder::new();
        enc.octet_string(&[0xAA; 200]);
        let bytes = enc.finish();
        assert_eq!(&bytes[..3], &[0x04, 0x81, 200]);
        assert_eq!(bytes.len(), 203);
    }
}
