use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// Whether the buffer looks like PEM armored text
pub fn is_pem(data: &[u8]) -> bool {
    data.windows(BEGIN_CERTIFICATE.len())
        .any(|w| w == BEGIN_CERTIFICATE.as_bytes())
}

/// Decode every `CERTIFICATE` block of a PEM file, in file order.
///
/// A block without a closing marker or with a broken payload yields nothing.
pub fn certificates_from_pem(text: &str) -> Vec<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut payload: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if line == BEGIN_CERTIFICATE {
            if payload.is_some() {
                debug!("Unterminated PEM certificate block, dropping it");
            }
            payload = Some(String::new());
        } else if line == END_CERTIFICATE {
            let Some(body) = payload.take() else {
                debug!("PEM end marker without a begin marker");
                continue;
            };
            match STANDARD.decode(body.as_bytes()) {
                Ok(der) if !der.is_empty() => blocks.push(der),
                Ok(_) => debug!("Empty PEM certificate block"),
                Err(e) => debug!("Invalid base64 in PEM certificate block: {e}"),
            }
        } else if let Some(body) = payload.as_mut() {
            body.push_str(line);
        }
    }
    if payload.is_some() {
        debug!("Unterminated PEM certificate block at end of input");
    }
    blocks
}
