//! Revocation data per CRL issuer and the read-only checker on top of it.
//!
//! The cache is filled by whoever fetches CRLs. Each issuer maps to an
//! immutable record; a refresh swaps the whole record, so a reader holding the
//! previous one keeps a consistent view.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use num_bigint::{BigInt, BigUint};
use tracing::{debug, info, warn};

use crate::asn1::Asn1Result;
use crate::asn1::revoked::parse_revoked_serials;
use crate::x509::{CertificateRevocationList, Name};

/// Revoked certificates of one issuer.
#[derive(Debug)]
pub enum RevocationRecord {
    /// Entries with their own revocation dates, from a fully decoded CRL
    Dated(HashMap<BigInt, DateTime<Utc>>),
    /// Encoded `revokedCertificates` content whose serial numbers are read on
    /// first use. Every listed serial counts as revoked from `revoked_since`.
    Serials {
        raw: Vec<u8>,
        revoked_since: DateTime<Utc>,
        parsed: OnceLock<HashSet<BigUint>>,
    },
}

impl RevocationRecord {
    pub fn from_crl(crl: &CertificateRevocationList) -> Self {
        Self::Dated(
            crl.revoked
                .iter()
                .map(|entry| (entry.serial_number.clone(), entry.revocation_date.at()))
                .collect(),
        )
    }

    pub fn from_revoked_serials(raw: Vec<u8>, revoked_since: DateTime<Utc>) -> Self {
        Self::Serials {
            raw,
            revoked_since,
            parsed: OnceLock::new(),
        }
    }

    /// Revocation date of `serial`, if listed
    pub fn revocation_date(&self, serial: &BigInt) -> Option<DateTime<Utc>> {
        match self {
            Self::Dated(entries) => entries.get(serial).copied(),
            Self::Serials { revoked_since, .. } => self
                .serials()
                .contains(&fast_path_key(serial))
                .then_some(*revoked_since),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Dated(entries) => entries.len(),
            Self::Serials { .. } => self.serials().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn serials(&self) -> &HashSet<BigUint> {
        static EMPTY: OnceLock<HashSet<BigUint>> = OnceLock::new();
        match self {
            Self::Dated(_) => EMPTY.get_or_init(HashSet::new),
            Self::Serials { raw, parsed, .. } => parsed.get_or_init(|| {
                let result = parse_revoked_serials(raw);
                if !result.is_complete() {
                    warn!(
                        "Revoked serial list only partially read: {} serials, {} problems",
                        result.serials.len(),
                        result.diagnostics.len()
                    );
                }
                debug!("Parsed {} revoked serials", result.serials.len());
                result.serials.into_iter().collect()
            }),
        }
    }
}

// The fast path reads INTEGER content bytes as unsigned, so a certificate
// serial is looked up by its two's complement encoding read the same way.
fn fast_path_key(serial: &BigInt) -> BigUint {
    BigUint::from_bytes_be(&serial.to_signed_bytes_be())
}

/// Shared revocation data keyed by CRL issuer name.
#[derive(Debug, Clone, Default)]
pub struct RevocationCache {
    records: Arc<DashMap<Name, Arc<RevocationRecord>>>,
}

impl RevocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record of the CRL issuer with the CRL's dated entries
    pub fn insert_crl(&self, crl: &CertificateRevocationList) {
        let record = RevocationRecord::from_crl(crl);
        info!(
            "Cached CRL of {} with {} revoked certificates",
            crl.issuer(),
            record.len()
        );
        self.records.insert(crl.issuer().clone(), Arc::new(record));
    }

    /// Replace the record of `issuer` with an unparsed `revokedCertificates`
    /// list. Serials are read on the first lookup.
    pub fn insert_revoked_serials(
        &self,
        issuer: Name,
        revoked_list: Vec<u8>,
        revoked_since: DateTime<Utc>,
    ) {
        debug!(
            "Cached {} bytes of revoked serials for {issuer}",
            revoked_list.len()
        );
        self.records.insert(
            issuer,
            Arc::new(RevocationRecord::from_revoked_serials(
                revoked_list,
                revoked_since,
            )),
        );
    }

    /// Cache the serials of an encoded CRL without decoding its entries.
    /// Listed serials count as revoked from the CRL's `thisUpdate`.
    pub fn insert_crl_serials(&self, crl_der: &[u8]) -> Asn1Result<()> {
        let (header, revoked_list) = CertificateRevocationList::revoked_list_bytes(crl_der)?;
        self.insert_revoked_serials(header.issuer, revoked_list, header.this_update.at());
        Ok(())
    }

    /// Current record of `issuer`
    pub fn record(&self, issuer: &Name) -> Option<Arc<RevocationRecord>> {
        self.records
            .get(issuer)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, issuer: &Name) -> bool {
        self.records.remove(issuer).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Answers revocation queries from a [`RevocationCache`]; never modifies it.
#[derive(Debug, Clone, Default)]
pub struct RevocationChecker {
    cache: RevocationCache,
}

impl RevocationChecker {
    pub fn new(cache: RevocationCache) -> Self {
        Self { cache }
    }

    /// Revocation date of the certificate `issuer`/`serial` if it was revoked
    /// on or before `as_of`. An issuer without cached data is not revoked.
    pub fn is_revoked(
        &self,
        issuer: &Name,
        serial: &BigInt,
        as_of: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let Some(record) = self.cache.record(issuer) else {
            debug!("No revocation data for {issuer}");
            return None;
        };
        record
            .revocation_date(serial)
            .filter(|revoked_at| *revoked_at <= as_of)
    }
}
