//! PKCS#7 SignedData envelopes and RFC 3161 timestamp tokens.

mod signed_data;
mod signer_info;
mod timestamp;

pub use signed_data::SignedMessage;
pub use signer_info::{Attribute, SignerInfo};
pub use timestamp::{Accuracy, MessageImprint, TimestampToken, TstInfo};
