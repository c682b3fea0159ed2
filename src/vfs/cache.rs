//! Per-directory freshness tracking
//!
//! A directory starts `Uninitialized`, becomes `Fresh` after its first
//! reconciliation and turns `Stale` once its deadline passes. There is no
//! timer: the deadline is compared against the clock on access.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Uninitialized,
    Fresh,
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    ttl: Option<Duration>,
    initialized: bool,
    deadline: Option<Instant>,
    invalidated: bool,
}

impl CachePolicy {
    /// A zero interval behaves like no interval at all.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
            ..Self::default()
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn freshness(&self, now: Instant) -> Freshness {
        if !self.initialized {
            return Freshness::Uninitialized;
        }
        let expired = self.deadline.is_some_and(|deadline| now >= deadline);
        if self.invalidated || expired {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// Record a completed reconciliation and arm the next deadline.
    pub fn mark_refreshed(&mut self, now: Instant) {
        self.initialized = true;
        self.invalidated = false;
        self.deadline = self.ttl.map(|ttl| now + ttl);
    }

    /// Replace the interval. The pending deadline is dropped; a non-zero
    /// interval re-arms from `now` when the directory is already populated.
    pub fn set_ttl(&mut self, ttl: Duration, now: Instant) {
        if ttl.is_zero() {
            self.ttl = None;
            self.deadline = None;
            return;
        }
        self.ttl = Some(ttl);
        self.deadline = self.initialized.then(|| now + ttl);
    }

    /// Force the next access to reconcile.
    pub fn invalidate(&mut self) {
        if self.initialized {
            self.invalidated = true;
        }
    }
}
