pub mod asn1;
pub mod config;
pub mod crypto;
pub mod pkcs7;
pub mod pki;
pub mod telemetry;
pub mod x509;
