mod errors;
pub mod rsa;

pub use errors::Error;
pub(crate) use errors::CryptoResult;

use crate::asn1::{Oid, oid};
use openssl::hash::{Hasher, MessageDigest as Digest};
use std::fmt;

/// Hash algorithms that may appear in certificates, signer infos and timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlg {
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlg {
    /// Hash the given data with this hash algorithm
    pub fn hash(&self, data: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
        let mut hasher = Hasher::new(self.into())?;
        hasher.update(data.as_ref())?;
        Ok(hasher.finish()?.to_vec())
    }

    /// Get the output size in bytes
    pub fn output_size(self) -> usize {
        match self {
            HashAlg::Sha1 => 20,
            HashAlg::Sha224 => 28,
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }

    /// Identifier of the digest algorithm itself
    pub fn oid(self) -> Oid {
        Oid::from(match self {
            HashAlg::Sha1 => oid::SHA1,
            HashAlg::Sha224 => oid::SHA224,
            HashAlg::Sha256 => oid::SHA256,
            HashAlg::Sha384 => oid::SHA384,
            HashAlg::Sha512 => oid::SHA512,
        })
    }

    /// Look up a digest algorithm identifier
    pub fn from_oid(oid: &Oid) -> Option<Self> {
        match oid.as_str() {
            oid::SHA1 => Some(HashAlg::Sha1),
            oid::SHA224 => Some(HashAlg::Sha224),
            oid::SHA256 => Some(HashAlg::Sha256),
            oid::SHA384 => Some(HashAlg::Sha384),
            oid::SHA512 => Some(HashAlg::Sha512),
            _ => None,
        }
    }

    /// Digest used by an RSA signature algorithm identifier (e.g. SHA256withRSA)
    pub fn for_rsa_signature(oid: &Oid) -> Option<Self> {
        match oid.as_str() {
            oid::SHA1_WITH_RSA => Some(HashAlg::Sha1),
            oid::SHA224_WITH_RSA => Some(HashAlg::Sha224),
            oid::SHA256_WITH_RSA => Some(HashAlg::Sha256),
            oid::SHA384_WITH_RSA => Some(HashAlg::Sha384),
            oid::SHA512_WITH_RSA => Some(HashAlg::Sha512),
            _ => None,
        }
    }
}

impl From<&HashAlg> for Digest {
    fn from(hash_alg: &HashAlg) -> Self {
        match hash_alg {
            HashAlg::Sha1 => Digest::sha1(),
            HashAlg::Sha224 => Digest::sha224(),
            HashAlg::Sha256 => Digest::sha256(),
            HashAlg::Sha384 => Digest::sha384(),
            HashAlg::Sha512 => Digest::sha512(),
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlg::Sha1 => "SHA-1",
            HashAlg::Sha224 => "SHA-224",
            HashAlg::Sha256 => "SHA-256",
            HashAlg::Sha384 => "SHA-384",
            HashAlg::Sha512 => "SHA-512",
        };
        write!(f, "{name}")
    }
}
