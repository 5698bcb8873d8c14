#![allow(dead_code)]

use chrono::{DateTime, Utc};
use databox_verify::asn1::{BitString, Encoder, Oid, oid, tag};
use databox_verify::crypto::HashAlg;
use databox_verify::x509::{AlgorithmIdentifier, Asn1Time, Name, SignedCertificate};
use num_bigint::BigInt;
use openssl::asn1::Asn1Time as OpensslTime;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::stack::Stack;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509, X509Name, X509NameBuilder};

/// A certificate with its private key, in both openssl and crate form
pub struct Issued {
    pub x509: X509,
    pub key: PKey<Private>,
    pub cert: SignedCertificate,
}

pub fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

pub fn x509_name(cn: &str) -> X509Name {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("C", "CZ").unwrap();
    name.append_entry_by_text("O", "Česká pošta, s.p.").unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    name.build()
}

fn time(text: &str) -> OpensslTime {
    OpensslTime::from_str(text).unwrap()
}

/// Self-signed CA valid from 2000 to 2049
pub fn ca(cn: &str) -> Issued {
    let key = rsa_key();
    let name = x509_name(cn);

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&time("20000101000000Z")).unwrap();
    builder.set_not_after(&time("20491231235959Z")).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .build()
                .unwrap(),
        )
        .unwrap();
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(None, None))
        .unwrap();
    builder.append_extension(ski).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    let x509 = builder.build();
    let cert = SignedCertificate::from_der(&x509.to_der().unwrap()).unwrap();
    Issued { x509, key, cert }
}

/// End-entity or intermediate certificate issued by `issuer`.
/// Validity bounds use the `YYYYMMDDHHMMSSZ` form.
pub fn issue(
    issuer: &Issued,
    cn: &str,
    serial: u32,
    validity: (&str, &str),
    digest: MessageDigest,
    is_ca: bool,
) -> Issued {
    let key = rsa_key();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&x509_name(cn)).unwrap();
    builder.set_issuer_name(issuer.x509.subject_name()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&time(validity.0)).unwrap();
    builder.set_not_after(&time(validity.1)).unwrap();

    let mut constraints = BasicConstraints::new();
    if is_ca {
        constraints.ca().pathlen(0);
    }
    builder
        .append_extension(constraints.critical().build().unwrap())
        .unwrap();
    builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .non_repudiation()
                .build()
                .unwrap(),
        )
        .unwrap();
    let san = SubjectAlternativeName::new()
        .email("podatelna@example.cz")
        .dns("datovka.example.cz")
        .build(&builder.x509v3_context(Some(issuer.x509.as_ref()), None))
        .unwrap();
    builder.append_extension(san).unwrap();
    let ski = SubjectKeyIdentifier::new()
        .build(&builder.x509v3_context(Some(issuer.x509.as_ref()), None))
        .unwrap();
    builder.append_extension(ski).unwrap();
    let aki = AuthorityKeyIdentifier::new()
        .keyid(true)
        .build(&builder.x509v3_context(Some(issuer.x509.as_ref()), None))
        .unwrap();
    builder.append_extension(aki).unwrap();
    builder.sign(&issuer.key, digest).unwrap();

    let x509 = builder.build();
    let cert = SignedCertificate::from_der(&x509.to_der().unwrap()).unwrap();
    Issued { x509, key, cert }
}

pub fn leaf(issuer: &Issued, cn: &str, serial: u32) -> Issued {
    issue(
        issuer,
        cn,
        serial,
        ("20200101000000Z", "20300101000000Z"),
        MessageDigest::sha256(),
        false,
    )
}

/// PKCS#7 SignedData over `content`, carrying `extra` certificates besides the signer's
pub fn sign_message(signer: &Issued, extra: &[&X509], content: &[u8], flags: Pkcs7Flags) -> Vec<u8> {
    let mut certs: Stack<X509> = Stack::new().unwrap();
    for cert in extra {
        certs.push((*cert).clone()).unwrap();
    }
    Pkcs7::sign(&signer.x509, &signer.key, &certs, content, flags | Pkcs7Flags::BINARY)
        .unwrap()
        .to_der()
        .unwrap()
}

pub fn rsa_sign(key: &PKey<Private>, data: &[u8]) -> Vec<u8> {
    let mut signer = Signer::new(MessageDigest::sha256(), key).unwrap();
    signer.sign_oneshot_to_vec(data).unwrap()
}

fn sha256_alg() -> AlgorithmIdentifier {
    AlgorithmIdentifier::with_null_parameters(Oid::from(oid::SHA256))
}

/// TSTInfo stamping `imprint` (a SHA-256 digest) at `gen_time`
pub fn tst_info(imprint: &[u8], gen_time: &str, tsa: Option<&Name>) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.constructed(tag::SEQUENCE, |tst| {
        tst.small_integer(1);
        tst.oid(&"1.3.158.36061701.1.2.2".parse().unwrap());
        tst.constructed(tag::SEQUENCE, |mi| {
            sha256_alg().encode(mi);
            mi.octet_string(imprint);
        });
        tst.integer(&BigInt::from(0x5eed_u32));
        tst.tlv(tag::GENERALIZED_TIME, gen_time.as_bytes());
        tst.constructed(tag::SEQUENCE, |acc| {
            acc.small_integer(1);
        });
        if let Some(tsa) = tsa {
            tst.constructed(tag::context_constructed(0), |gn| {
                gn.constructed(tag::context_constructed(4), |dir| tsa.encode(dir));
            });
        }
    });
    enc.finish()
}

/// Timestamp token: SignedData with id-ct-TSTInfo content signed by `tsa`.
/// `embedded` certificates go into the envelope.
pub fn timestamp_token(tsa: &Issued, tst_info: &[u8], embedded: &[&SignedCertificate]) -> Vec<u8> {
    let content_digest = HashAlg::Sha256.hash(tst_info).unwrap();

    let mut attrs = Encoder::new();
    attrs.constructed(tag::SEQUENCE, |attr| {
        attr.oid(&Oid::from(oid::ATTR_CONTENT_TYPE));
        attr.constructed(tag::SET, |set| {
            set.oid(&Oid::from(oid::CT_TST_INFO));
        });
    });
    attrs.constructed(tag::SEQUENCE, |attr| {
        attr.oid(&Oid::from(oid::ATTR_MESSAGE_DIGEST));
        attr.constructed(tag::SET, |set| {
            set.octet_string(&content_digest);
        });
    });
    attrs.constructed(tag::SEQUENCE, |attr| {
        attr.oid(&Oid::from(oid::ATTR_SIGNING_TIME));
        attr.constructed(tag::SET, |set| {
            Asn1Time::from_datetime(Utc::now()).encode(set);
        });
    });
    let attrs = attrs.finish();

    let mut signed_attrs = Encoder::new();
    signed_attrs.tlv(tag::SET, &attrs);
    let signature = rsa_sign(&tsa.key, &signed_attrs.finish());

    let mut enc = Encoder::new();
    enc.constructed(tag::SEQUENCE, |ci| {
        ci.oid(&Oid::from(oid::PKCS7_SIGNED_DATA));
        ci.constructed(tag::context_constructed(0), |explicit| {
            explicit.constructed(tag::SEQUENCE, |sd| {
                sd.small_integer(3);
                sd.constructed(tag::SET, |algs| sha256_alg().encode(algs));
                sd.constructed(tag::SEQUENCE, |encap| {
                    encap.oid(&Oid::from(oid::CT_TST_INFO));
                    encap.constructed(tag::context_constructed(0), |c| {
                        c.octet_string(tst_info);
                    });
                });
                if !embedded.is_empty() {
                    sd.constructed(tag::context_constructed(0), |certs| {
                        for cert in embedded {
                            certs.raw(cert.raw_der());
                        }
                    });
                }
                sd.constructed(tag::SET, |signers| {
                    signers.constructed(tag::SEQUENCE, |si| {
                        si.small_integer(1);
                        si.constructed(tag::SEQUENCE, |sid| {
                            tsa.cert.issuer().encode(sid);
                            sid.integer(tsa.cert.serial_number());
                        });
                        sha256_alg().encode(si);
                        si.tlv(tag::context_constructed(0), &attrs);
                        AlgorithmIdentifier::with_null_parameters(Oid::from(oid::RSA_ENCRYPTION))
                            .encode(si);
                        si.octet_string(&signature);
                    });
                });
            });
        });
    });
    enc.finish()
}

/// One revoked entry: serial and revocation date
pub type RevokedEntry = (u32, DateTime<Utc>);

/// CRL over `entries`, signed by `issuer`
pub fn crl(issuer: &Issued, this_update: DateTime<Utc>, entries: &[RevokedEntry]) -> Vec<u8> {
    let sig_alg = AlgorithmIdentifier::with_null_parameters(Oid::from(oid::SHA256_WITH_RSA));

    let mut tbs = Encoder::new();
    tbs.constructed(tag::SEQUENCE, |t| {
        t.small_integer(1);
        sig_alg.encode(t);
        issuer.cert.subject().encode(t);
        Asn1Time::from_datetime(this_update).encode(t);
        Asn1Time::from_datetime(this_update + chrono::Duration::days(7)).encode(t);
        if !entries.is_empty() {
            t.constructed(tag::SEQUENCE, |list| {
                for (serial, revoked_at) in entries {
                    list.constructed(tag::SEQUENCE, |entry| {
                        entry.integer(&BigInt::from(*serial));
                        Asn1Time::from_datetime(*revoked_at).encode(entry);
                        // reasonCode keyCompromise
                        entry.constructed(tag::SEQUENCE, |exts| {
                            exts.constructed(tag::SEQUENCE, |ext| {
                                ext.oid(&Oid::from(oid::EXT_CRL_REASON));
                                ext.octet_string(&[0x0A, 0x01, 0x01]);
                            });
                        });
                    });
                }
            });
        }
    });
    let tbs = tbs.finish();
    let signature = rsa_sign(&issuer.key, &tbs);

    let mut enc = Encoder::new();
    enc.constructed(tag::SEQUENCE, |list| {
        list.raw(&tbs);
        sig_alg.encode(list);
        list.bit_string(&BitString::new(signature));
    });
    enc.finish()
}
