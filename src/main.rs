use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use clap::Parser;
use color_eyre::eyre::WrapErr as _;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use databox_verify::{
    asn1::oid,
    config::Config,
    pkcs7::SignedMessage,
    pki::{
        CertificateValidator, CertificateVerifier, RevocationCache, RevocationChecker,
        TimestampVerifier, TrustStore, VerificationCache, VerificationReport, certificates_from_pem,
        is_pem, verify_signed_message,
    },
    telemetry,
    x509::SignedCertificate,
};

/// Verify data-mailbox messages, timestamp tokens and certificates
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Signed messages, timestamp tokens or certificates (DER, base64 or PEM)
    #[arg(required = true, value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Stamped content, for timestamp token inputs
    #[arg(long, value_name = "FILE")]
    content: Option<PathBuf>,

    /// Reference date for validity and revocation checks, defaults to now
    #[arg(long, value_name = "RFC3339", value_parser = parse_date)]
    at: Option<DateTime<Utc>>,
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|at| at.with_timezone(&Utc))
}

struct Verifiers {
    trusted: Vec<SignedCertificate>,
    validator: CertificateValidator,
    timestamps: TimestampVerifier,
    content: Option<Vec<u8>>,
    at: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = Config::load()?;
    info!("Loaded configuration: {:?}", config);

    let trust = match TrustStore::load_dir(&config.trust.certs_dir).await {
        Ok(store) => store,
        Err(e) => {
            warn!(
                "No trusted certificates loaded from {}: {e}",
                config.trust.certs_dir.display()
            );
            TrustStore::new()
        }
    };

    let revocations = RevocationCache::new();
    if let Some(dir) = &config.revocation.crl_dir {
        load_crls(&revocations, dir).await?;
    }

    let verifier = CertificateVerifier::new(config.verifier);
    let content = match &args.content {
        Some(path) => Some(
            fs::read(path)
                .await
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let verifiers = Verifiers {
        trusted: trust.snapshot(),
        validator: CertificateValidator::new(
            verifier.clone(),
            RevocationChecker::new(revocations),
            VerificationCache::new(),
        ),
        timestamps: TimestampVerifier::new(verifier),
        content,
        at: args.at.unwrap_or_else(Utc::now),
    };

    let mut reports = Vec::new();
    for path in &args.inputs {
        let source = path.display().to_string();
        match fs::read(path).await {
            Ok(data) => reports.extend(verify_input(&source, &data, &verifiers)),
            Err(e) => reports.push(VerificationReport::for_error(source, e, verifiers.at)),
        }
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    if !reports.iter().all(VerificationReport::is_trusted) {
        std::process::exit(1);
    }
    Ok(())
}

/// Cache the revoked serials of every `.crl` file under `dir`
async fn load_crls(cache: &RevocationCache, dir: &Path) -> color_eyre::Result<()> {
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || !path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("crl"))
        {
            continue;
        }
        let data = fs::read(path).await?;
        if let Err(e) = cache.insert_crl_serials(&decode_blob(&data)) {
            warn!("Skipping CRL {}: {e}", path.display());
        }
    }
    info!("Cached revocation data for {} issuers", cache.len());
    Ok(())
}

// Files hold DER or the base64 form the mailbox service delivers
fn decode_blob(data: &[u8]) -> Vec<u8> {
    if data.first() == Some(&0x30) {
        return data.to_vec();
    }
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match STANDARD.decode(&compact) {
        Ok(der) => der,
        Err(e) => {
            debug!("Input is not base64 ({e}), reading it as DER");
            data.to_vec()
        }
    }
}

fn verify_input(source: &str, data: &[u8], verifiers: &Verifiers) -> Vec<VerificationReport> {
    let at = verifiers.at;

    if is_pem(data) {
        let blocks = certificates_from_pem(&String::from_utf8_lossy(data));
        if blocks.is_empty() {
            return vec![VerificationReport::for_error(source, "No certificate in PEM file", at)];
        }
        return blocks
            .iter()
            .enumerate()
            .map(|(idx, der)| verify_certificate(&format!("{source}#{idx}"), der, verifiers))
            .collect();
    }

    let der = decode_blob(data);
    let report = match SignedMessage::from_der(&der) {
        Ok(message) if message.content_type == oid::CT_TST_INFO => {
            match &verifiers.content {
                Some(content) => {
                    match verifiers.timestamps.verify(&der, content, &verifiers.trusted) {
                        Ok(verification) => {
                            VerificationReport::for_timestamp(source, &verification, at)
                        }
                        Err(e) => VerificationReport::for_error(source, e, at),
                    }
                }
                None => VerificationReport::for_error(
                    source,
                    "Timestamp token given without --content",
                    at,
                ),
            }
        }
        Ok(_) => match verify_signed_message(&der, &verifiers.trusted, &verifiers.validator) {
            Ok(verification) => {
                VerificationReport::for_message(source, &verification, &verifiers.validator, at)
            }
            Err(e) => VerificationReport::for_error(source, e, at),
        },
        Err(_) => verify_certificate(source, &der, verifiers),
    };
    vec![report]
}

fn verify_certificate(source: &str, der: &[u8], verifiers: &Verifiers) -> VerificationReport {
    let cert = match SignedCertificate::from_der(der) {
        Ok(cert) => cert,
        Err(e) => {
            return VerificationReport::for_error(
                source,
                format!("Neither a signed message nor a certificate: {e}"),
                verifiers.at,
            );
        }
    };
    match verifiers
        .validator
        .verify_and_record(&cert, &verifiers.trusted)
    {
        Ok(_) => VerificationReport::for_certificate(source, &cert, &verifiers.validator, verifiers.at),
        Err(e) => VerificationReport::for_error(source, e, verifiers.at),
    }
}
