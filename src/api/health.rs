//! Shared health state for the /health endpoint.
//! Updated by the evaluation handlers and the advisory client.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::types::FeedOrigin;

const ORIGIN_NONE: u8 = 0;
const ORIGIN_LIVE: u8 = 1;
const ORIGIN_FALLBACK: u8 = 2;

/// Shared service counters. Written by handlers, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Origin of the most recently loaded snapshot (0 = none yet).
    last_origin: AtomicU8,
    /// Nanosecond timestamp of the last completed evaluation (0 = none).
    last_evaluation_at_ns: AtomicU64,
    evaluations: AtomicU64,
    /// Advisory requests answered with the static fallback.
    advisory_fallbacks: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_last_origin(&self, origin: FeedOrigin) {
        let v = match origin {
            FeedOrigin::Live => ORIGIN_LIVE,
            FeedOrigin::Fallback => ORIGIN_FALLBACK,
        };
        self.last_origin.store(v, Ordering::Relaxed);
    }

    pub fn record_evaluation(&self, at_ns: u64) {
        self.last_evaluation_at_ns.store(at_ns, Ordering::Relaxed);
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_advisory_fallbacks(&self) {
        self.advisory_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_origin(&self) -> Option<FeedOrigin> {
        match self.last_origin.load(Ordering::Relaxed) {
            ORIGIN_LIVE => Some(FeedOrigin::Live),
            ORIGIN_FALLBACK => Some(FeedOrigin::Fallback),
            _ => None,
        }
    }

    pub fn last_evaluation_at_ns(&self) -> u64 {
        self.last_evaluation_at_ns.load(Ordering::Relaxed)
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn advisory_fallbacks(&self) -> u64 {
        self.advisory_fallbacks.load(Ordering::Relaxed)
    }
}
