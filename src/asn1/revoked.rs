//! Fast revoked-certificate serial number parser.
//!
//! CRLs published for the mailbox service list hundreds of thousands of entries;
//! building a full object for each of them is far too slow. This parser only
//! reads the serial number of each `revokedCertificates` entry and jumps over
//! the revocation date and entry extensions using the entry length.
//!
//! Parsing is best effort: the first malformed entry stops the loop, and the
//! serials collected so far are returned together with the diagnostic.

use num_bigint::BigUint;
use tracing::warn;

use super::{Asn1Error, Asn1Result, decode_length, tag};

/// Outcome of a fast-path parse: the serials read before any problem, plus what went wrong.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevokedSerials {
    pub serials: Vec<BigUint>,
    pub diagnostics: Vec<Asn1Error>,
}

impl RevokedSerials {
    /// True when the whole list was read
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parse the content of a `revokedCertificates` SEQUENCE OF into serial numbers.
///
/// `data` is the concatenation of the entries, without the outer SEQUENCE header.
pub fn parse_revoked_serials(data: &[u8]) -> RevokedSerials {
    let mut result = RevokedSerials::default();
    let mut offset = 0;

    while offset < data.len() {
        match parse_one_serial(&data[offset..]) {
            Ok((serial, next)) => {
                result.serials.push(serial);
                offset += next;
            }
            Err(e) => {
                warn!(
                    "Error parsing revoked certificates list after {} entries: {e}",
                    result.serials.len()
                );
                result.diagnostics.push(e);
                break;
            }
        }
    }

    result
}

// Returns the serial number of the entry at the start of `data` and the offset
// of the next entry.
fn parse_one_serial(data: &[u8]) -> Asn1Result<(BigUint, usize)> {
    const ENTRY: &str = "revokedCertificates.entry";
    const SERIAL: &str = "revokedCertificates.entry.userCertificate";

    if data[0] != tag::SEQUENCE {
        return Err(Asn1Error::malformed(
            ENTRY,
            format!("Unexpected tag 0x{:02X}, expecting SEQUENCE", data[0]),
        ));
    }
    let (entry_len, len_size) = decode_length(&data[1..]).map_err(|e| e.within(ENTRY))?;
    let content_offset = 1 + len_size;
    let next_start = content_offset
        .checked_add(entry_len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| Asn1Error::malformed(ENTRY, "Entry runs past the end of the list"))?;

    match data[..next_start].get(content_offset) {
        Some(&tag::INTEGER) => {}
        Some(other) => {
            return Err(Asn1Error::malformed(
                SERIAL,
                format!("Unexpected tag 0x{other:02X}, expecting INTEGER"),
            ));
        }
        None => return Err(Asn1Error::malformed(SERIAL, "Empty entry")),
    }

    let (int_len, int_len_size) =
        decode_length(&data[content_offset + 1..next_start]).map_err(|e| e.within(SERIAL))?;
    let start = content_offset + 1 + int_len_size;
    let end = start
        .checked_add(int_len)
        .filter(|&end| int_len != 0 && end <= next_start)
        .ok_or_else(|| {
            Asn1Error::malformed(SERIAL, format!("Invalid serial number length {int_len}"))
        })?;

    Ok((BigUint::from_bytes_be(&data[start..end]), next_start))
}
