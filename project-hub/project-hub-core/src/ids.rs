//! Identifier and clock seams. `ProjectStore` takes both as trait objects so
//! tests can pin ids and timestamps instead of fishing them out of records.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of record identifiers.
pub trait IdProvider: Send + Sync {
    /// Globally unique id carrying the given prefix, e.g. `folder-<uuid>`.
    fn fresh(&self, prefix: &str) -> String;

    /// Deterministic id derived from `seed`: the same seed always yields the
    /// same id. Used by bulk import so a retry lands on existing records.
    fn derived(&self, prefix: &str, seed: &str) -> String;
}

pub struct UuidIds;

impl IdProvider for UuidIds {
    fn fresh(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }

    fn derived(&self, prefix: &str, seed: &str) -> String {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes());
        format!("{}-{}", prefix, id)
    }
}

/// Sequential ids (`folder-1`, `folder-2`, ...) for tests that assert on them.
pub struct SeqIds {
    next: AtomicU64,
}

impl SeqIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SeqIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for SeqIds {
    fn fresh(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", prefix, n)
    }

    fn derived(&self, prefix: &str, seed: &str) -> String {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes());
        format!("{}-{}", prefix, id)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
