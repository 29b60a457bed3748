//! Lease table: claim-with-TTL guard against double-processing
//!
//! Overlapping passes (e.g. a slow invocation still running when the
//! next trigger fires) must not transition the same enrollment twice.
//! A lease is an exclusive claim on an enrollment id, held for the
//! duration of one transition and released afterwards. The TTL recovers
//! claims abandoned by a crashed holder.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use drip_types::EnrollmentId;

/// Default claim lifetime; generous for a single transition
pub const DEFAULT_LEASE_TTL_SECS: i64 = 120;

/// An indexed table of time-bounded enrollment claims
#[derive(Debug, Default)]
pub struct LeaseTable {
    claims: DashMap<EnrollmentId, DateTime<Utc>>,
    ttl: Duration,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_LEASE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            claims: DashMap::new(),
            ttl,
        }
    }

    /// Try to claim an enrollment. Returns false if an unexpired claim
    /// is already held; an expired claim is replaced.
    pub fn claim(&self, id: &EnrollmentId, now: DateTime<Utc>) -> bool {
        match self.claims.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    false
                } else {
                    occupied.insert(now + self.ttl);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now + self.ttl);
                true
            }
        }
    }

    /// Release a claim after the transition's store write finished
    pub fn release(&self, id: &EnrollmentId) {
        self.claims.remove(id);
    }

    /// Drop every expired claim; returns how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.claims.len();
        self.claims.retain(|_, expires| *expires > now);
        before - self.claims.len()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
