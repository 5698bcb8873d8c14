//! DER decoding and encoding used by every structure in this crate.
//!
//! The general path ([`Reader`]) decodes any tag/length/value tree, the fast path
//! ([`revoked::parse_revoked_serials`]) only extracts serial numbers from the
//! `revokedCertificates` field of a CRL.

mod decoder;
mod encoder;
mod errors;
pub mod oid;
pub mod revoked;

pub use decoder::{BitString, Reader, Tlv, decode_length};
pub use encoder::{Encoder, encode_length, encode_tlv};
pub use errors::{Asn1Error, Asn1Result};
pub use oid::Oid;

/// Universal and context-specific tag bytes.
pub mod tag {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const ENUMERATED: u8 = 0x0A;
    pub const UTF8_STRING: u8 = 0x0C;
    pub const PRINTABLE_STRING: u8 = 0x13;
    pub const T61_STRING: u8 = 0x14;
    pub const IA5_STRING: u8 = 0x16;
    pub const UTC_TIME: u8 = 0x17;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const VISIBLE_STRING: u8 = 0x1A;
    pub const UNIVERSAL_STRING: u8 = 0x1C;
    pub const BMP_STRING: u8 = 0x1E;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
    /// OCTET STRING in its BER constructed (fragmented) form
    pub const OCTET_STRING_CONSTRUCTED: u8 = 0x24;

    pub const CONSTRUCTED: u8 = 0x20;

    /// `[n]` IMPLICIT on a primitive type
    pub const fn context(n: u8) -> u8 {
        0x80 | n
    }

    /// `[n]` EXPLICIT, or IMPLICIT on a constructed type
    pub const fn context_constructed(n: u8) -> u8 {
        0xA0 | n
    }
}
