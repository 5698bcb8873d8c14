mod common;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeZone, Utc};
use databox_verify::crypto::HashAlg;
use databox_verify::pki::{
    TimestampVerifier, VerificationError, VerificationReport, verify_timestamp,
    verify_timestamp_b64,
};
use databox_verify::x509::SignedCertificate;
use num_bigint::BigInt;
use openssl::hash::MessageDigest;

const CONTENT: &[u8] = b"<q:MessageDownloadResponse>zprava</q:MessageDownloadResponse>";

struct Fixture {
    ca: common::Issued,
    tsa: common::Issued,
}

fn fixture() -> Fixture {
    let ca = common::ca("PostSignum Root QCA 4");
    let tsa = common::issue(
        &ca,
        "PostSignum TSA",
        0x5001,
        ("20200101000000Z", "20350101000000Z"),
        MessageDigest::sha256(),
        false,
    );
    Fixture { ca, tsa }
}

fn token_for(tsa: &common::Issued, content: &[u8], embedded: &[&SignedCertificate]) -> Vec<u8> {
    let imprint = HashAlg::Sha256.hash(content).unwrap();
    let info = common::tst_info(&imprint, "20240601120000Z", Some(tsa.cert.subject()));
    common::timestamp_token(tsa, &info, embedded)
}

#[test]
fn test_valid_token() {
    let fx = fixture();
    let token = token_for(&fx.tsa, CONTENT, &[&fx.tsa.cert]);

    let verification = verify_timestamp(&token, CONTENT, &[fx.ca.cert.clone()]).unwrap();
    assert!(verification.signature_verified);
    assert!(verification.imprint_matches);
    assert!(verification.is_valid());

    let token = &verification.token;
    assert_eq!(token.gen_time(), Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    assert_eq!(token.tsa(), Some(fx.tsa.cert.subject()));
    assert_eq!(token.info.serial_number, BigInt::from(0x5eed));
    assert!(token.certificates_contain(&BigInt::from(0x5001)));
    assert_eq!(token.accuracy().unwrap().as_duration(), Some(chrono::Duration::seconds(1)));
}

#[test]
fn test_imprint_mismatch() {
    let fx = fixture();
    let token = token_for(&fx.tsa, b"jina zprava", &[&fx.tsa.cert]);

    let verification = verify_timestamp(&token, CONTENT, &[fx.ca.cert.clone()]).unwrap();
    assert!(verification.signature_verified);
    assert!(!verification.imprint_matches);
    assert!(!verification.is_valid());

    let report = VerificationReport::for_timestamp("token.tsr", &verification, Utc::now());
    assert!(!report.is_trusted());
}

#[test]
fn test_advertised_hash() {
    let fx = fixture();
    let token = token_for(&fx.tsa, CONTENT, &[&fx.tsa.cert]);
    let verification = verify_timestamp(&token, CONTENT, &[fx.ca.cert.clone()]).unwrap();

    let advertised = HashAlg::Sha256.hash(CONTENT).unwrap();
    assert!(verification.token.imprint_matches(&advertised));
    assert!(!verification.token.imprint_matches(&advertised[1..]));
}

#[test]
fn test_unknown_tsa_issuer() {
    let fx = fixture();
    let other = common::ca("I.CA Root CA");
    let token = token_for(&fx.tsa, CONTENT, &[&fx.tsa.cert]);

    let result = verify_timestamp(&token, CONTENT, &[other.cert.clone()]);
    assert!(matches!(result, Err(VerificationError::IssuerNotFound(_))));
}

#[test]
fn test_signer_certificate_from_trusted() {
    let fx = fixture();
    let token = token_for(&fx.tsa, CONTENT, &[]);

    let trusted = [fx.ca.cert.clone(), fx.tsa.cert.clone()];
    let verification = verify_timestamp(&token, CONTENT, &trusted).unwrap();
    assert!(verification.is_valid());
}

#[test]
fn test_signer_not_found() {
    let fx = fixture();
    let token = token_for(&fx.tsa, CONTENT, &[]);

    let result = verify_timestamp(&token, CONTENT, &[fx.ca.cert.clone()]);
    assert!(matches!(result, Err(VerificationError::SignerNotFound(_))));
}

#[test]
fn test_wrong_signing_key() {
    let fx = fixture();
    let impostor = common::Issued {
        x509: fx.tsa.x509.clone(),
        key: common::rsa_key(),
        cert: fx.tsa.cert.clone(),
    };
    let token = token_for(&impostor, CONTENT, &[&fx.tsa.cert]);

    let verification = verify_timestamp(&token, CONTENT, &[fx.ca.cert.clone()]).unwrap();
    assert!(!verification.signature_verified);
    assert!(verification.imprint_matches);
}

#[test]
fn test_base64_with_line_breaks() {
    let fx = fixture();
    let token = token_for(&fx.tsa, CONTENT, &[&fx.tsa.cert]);

    let encoded = STANDARD.encode(&token);
    let wrapped: String = encoded
        .as_bytes()
        .chunks(64)
        .map(|line| format!("{}\r\n", std::str::from_utf8(line).unwrap()))
        .collect();

    let verification = verify_timestamp_b64(&wrapped, CONTENT, &[fx.ca.cert.clone()]).unwrap();
    assert!(verification.is_valid());

    let result = TimestampVerifier::default().verify_b64("not base64!", CONTENT, &[]);
    assert!(matches!(result, Err(VerificationError::Base64(_))));
}

#[test]
fn test_not_a_timestamp() {
    let fx = fixture();
    let message = common::sign_message(
        &fx.tsa,
        &[],
        CONTENT,
        openssl::pkcs7::Pkcs7Flags::empty(),
    );

    let result = verify_timestamp(&message, CONTENT, &[fx.ca.cert.clone()]);
    assert!(matches!(result, Err(VerificationError::Encoding(_))));
}
