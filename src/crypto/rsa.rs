use crate::asn1::{Asn1Result, Oid, Reader, tag};
use crate::crypto::HashAlg;
use crate::crypto::errors::{CryptoResult, Error};
use num_bigint::BigUint;
use openssl::bn::BigNum;
use openssl::pkey::Public;
use openssl::rsa::{Padding, Rsa};
use std::fmt;
use tracing::debug;

/// RSA public key built from the modulus and exponent found in a certificate
#[derive(Clone)]
pub struct RsaPublicKey {
    key: Rsa<Public>,
}

impl RsaPublicKey {
    /// Build a key from big-endian modulus and public exponent.
    ///
    /// The exponent must be odd and at least 3, and the modulus odd.
    pub fn from_components(modulus: &BigUint, exponent: &BigUint) -> CryptoResult<Self> {
        if !modulus.bit(0) {
            return Err(Error::Invalid(format!(
                "RSA modulus of {} bits is not odd",
                modulus.bits()
            )));
        }
        if !exponent.bit(0) || *exponent < BigUint::from(3u32) {
            return Err(Error::Invalid(format!("RSA public exponent {exponent}")));
        }
        let n = BigNum::from_slice(&modulus.to_bytes_be())?;
        let e = BigNum::from_slice(&exponent.to_bytes_be())?;
        let key = Rsa::from_public_components(n, e)?;
        Ok(Self { key })
    }

    /// Modulus size in bytes
    pub fn size(&self) -> usize {
        self.key.size() as usize
    }

    /// Apply the public key to `signature` and strip the PKCS#1 v1.5 type 1 padding.
    ///
    /// Returns `None` when the signature has the wrong size or the padding is malformed.
    pub fn recover(&self, signature: &[u8]) -> Option<Vec<u8>> {
        if signature.len() != self.size() {
            debug!(
                "Signature length {} does not match modulus size {}",
                signature.len(),
                self.size()
            );
            return None;
        }

        let mut block = vec![0u8; self.size()];
        match self.key.public_decrypt(signature, &mut block, Padding::PKCS1) {
            Ok(len) => {
                block.truncate(len);
                Some(block)
            }
            Err(e) => {
                debug!("RSA signature block is not PKCS#1 v1.5 padded: {e}");
                None
            }
        }
    }

    /// Check that `signature` carries a DigestInfo for `hash_alg` equal to `digest`.
    ///
    /// Any mismatch (padding, algorithm identifier, digest value) yields `false`.
    pub fn verify_digest(&self, signature: &[u8], hash_alg: HashAlg, digest: &[u8]) -> bool {
        let Some(block) = self.recover(signature) else {
            return false;
        };

        match parse_digest_info(&block) {
            Ok((alg, recovered)) => {
                if alg != hash_alg.oid() {
                    debug!("DigestInfo algorithm {alg} does not match expected {hash_alg}");
                    return false;
                }
                recovered == digest
            }
            Err(e) => {
                debug!("Invalid DigestInfo in signature block: {e}");
                false
            }
        }
    }

    /// Hash `data` with `hash_alg` and verify the signature over it
    pub fn verify(
        &self,
        data: impl AsRef<[u8]>,
        signature: &[u8],
        hash_alg: HashAlg,
    ) -> CryptoResult<bool> {
        let digest = hash_alg.hash(data)?;
        Ok(self.verify_digest(signature, hash_alg, &digest))
    }
}

impl fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("bits", &(self.size() * 8))
            .finish()
    }
}

// DigestInfo ::= SEQUENCE { digestAlgorithm AlgorithmIdentifier, digest OCTET STRING }
fn parse_digest_info(block: &[u8]) -> Asn1Result<(Oid, Vec<u8>)> {
    let mut outer = Reader::new(block, "digestInfo");
    let mut info = outer.sequence("digestInfo")?;
    outer.finish()?;

    let mut algorithm = info.sequence("digestInfo.digestAlgorithm")?;
    let oid = algorithm.oid("digestInfo.digestAlgorithm.algorithm")?;
    algorithm.read_optional(tag::NULL, "digestInfo.digestAlgorithm.parameters")?;
    algorithm.finish()?;

    let digest = info.read(tag::OCTET_STRING, "digestInfo.digest")?.value.to_vec();
    info.finish()?;
    Ok((oid, digest))
}
