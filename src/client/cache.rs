//! In-memory response cache for the license client.
//!
//! Entries are keyed by operation and argument and hold the decoded result of
//! a successful read. There is no expiry and no size bound: the cache lives
//! as long as the client and is emptied wholesale by every mutating call.
//!
//! A detailed listing writes through to the plain listing and to the per-IP
//! entries, so one bulk call answers later lookups without a round trip.
//!
//! Every [`clear`](ResponseCache::clear) starts a new generation. A read takes
//! the generation before going to the network and stores its result only if no
//! clear happened in between, so a response fetched before a write can never
//! land in the cache after it.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::types::{LicenseRecord, LicenseType};

/// Operation plus argument a cached response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `getIpList` for a license type
    List(LicenseType),
    /// `getIpListDetailed` for a license type
    ListDetailed(LicenseType),
    /// `getIpDetails` for one address
    Detail(Ipv4Addr),
}

/// A cached, already decoded response.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResponse {
    IpList(Vec<String>),
    Detailed(Vec<LicenseRecord>),
    Detail(LicenseRecord),
}

/// Opaque marker of the cache contents a read started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<CacheKey, CachedResponse>,
}

impl CacheState {
    fn is_current(&self, generation: Generation) -> bool {
        if self.generation == generation.0 {
            return true;
        }
        debug!(
            started = generation.0,
            current = self.generation,
            "discarding response fetched before a cache clear"
        );
        false
    }
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    state: Mutex<CacheState>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are plain data; a panic elsewhere cannot leave them half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current generation. Take it before fetching what will be stored.
    pub fn generation(&self) -> Generation {
        Generation(self.lock().generation)
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.lock().entries.get(key).cloned()
    }

    /// Store a response fetched during `generation`.
    ///
    /// Returns false, storing nothing, if the cache was cleared since.
    pub fn insert(&self, generation: Generation, key: CacheKey, value: CachedResponse) -> bool {
        let mut state = self.lock();
        if !state.is_current(generation) {
            return false;
        }
        state.entries.insert(key, value);
        true
    }

    pub fn ip_list(&self, license_type: LicenseType) -> Option<Vec<String>> {
        match self.get(&CacheKey::List(license_type))? {
            CachedResponse::IpList(ips) => Some(ips),
            _ => None,
        }
    }

    pub fn detailed(&self, license_type: LicenseType) -> Option<Vec<LicenseRecord>> {
        match self.get(&CacheKey::ListDetailed(license_type))? {
            CachedResponse::Detailed(records) => Some(records),
            _ => None,
        }
    }

    pub fn detail(&self, ip: Ipv4Addr) -> Option<LicenseRecord> {
        match self.get(&CacheKey::Detail(ip))? {
            CachedResponse::Detail(record) => Some(record),
            _ => None,
        }
    }

    /// Store a detailed listing together with the plain listing and every
    /// per-IP entry it implies.
    ///
    /// Records whose address does not parse are kept in the listings but get
    /// no per-IP entry. Like [`insert`](Self::insert), stores nothing if the
    /// cache was cleared since `generation`.
    pub fn store_detailed(
        &self,
        generation: Generation,
        license_type: LicenseType,
        records: &[LicenseRecord],
    ) -> bool {
        let ips: Vec<String> = records.iter().map(|r| r.ip_address.clone()).collect();

        let mut state = self.lock();
        if !state.is_current(generation) {
            return false;
        }
        for record in records {
            match record.ip_address.parse::<Ipv4Addr>() {
                Ok(ip) => {
                    state
                        .entries
                        .insert(CacheKey::Detail(ip), CachedResponse::Detail(record.clone()));
                }
                Err(_) => debug!(ip = %record.ip_address, "skipping per-IP cache for unparseable address"),
            }
        }
        state
            .entries
            .insert(CacheKey::List(license_type), CachedResponse::IpList(ips));
        state.entries.insert(
            CacheKey::ListDetailed(license_type),
            CachedResponse::Detailed(records.to_vec()),
        );
        true
    }

    /// Drop every entry and start a new generation.
    pub fn clear(&self) {
        let mut state = self.lock();
        if !state.entries.is_empty() {
            debug!(entries = state.entries.len(), "clearing response cache");
        }
        state.entries.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
