//! Token bucket admission control for the shared ledger
//!
//! This is a single *global* gate: it bounds aggregate vote throughput
//! rather than policing individual clients (that job belongs to the
//! anomaly detector).
use chrono::Utc;
use serde::Serialize;

use crate::settings::LimiterSettings;

/// Snapshot of limiter state for the status endpoint.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterStatus {
    pub capacity: u32,
    pub tokens: u32,
    pub refill_rate: u32,
}

/// Token bucket shared by all clients.
#[derive(Clone, Debug)]
pub struct TokenBucket {
    pub capacity: u32,
    /// Tokens replenished per second
    pub refill_rate: u32,
    pub tokens: f64,
    /// Epoch milliseconds of the last refill that added whole tokens
    pub last_refill: i64,
}

impl TokenBucket {
    pub fn new(settings: &LimiterSettings) -> Self {
        Self {
            capacity: settings.capacity,
            refill_rate: settings.refill_rate,
            tokens: f64::from(settings.capacity),
            last_refill: Utc::now().timestamp_millis(),
        }
    }

    /// Add tokens earned since the last refill. Only whole tokens are
    /// credited, and `last_refill` advances only when at least one token
    /// was added, so fractional progress is never discarded.
    fn refill(&mut self, now_ms: i64) {
        let elapsed_ms = now_ms - self.last_refill;
        if elapsed_ms <= 0 {
            return;
        }
        let tokens_to_add = ((elapsed_ms as f64 / 1000.0) * f64::from(self.refill_rate)).floor();
        if tokens_to_add > 0.0 {
            self.tokens = (self.tokens + tokens_to_add).clamp(0.0, f64::from(self.capacity));
            self.last_refill = now_ms;
        }
    }

    /// Try to take `cost` tokens at an explicit timestamp. Fails with no
    /// side effect on the token count when the bucket is short.
    pub fn try_acquire_at(&mut self, cost: u32, now_ms: i64) -> bool {
        self.refill(now_ms);
        if self.tokens >= f64::from(cost) {
            self.tokens -= f64::from(cost);
            true
        } else {
            false
        }
    }

    /// Try to take `cost` tokens now.
    pub fn try_acquire(&mut self, cost: u32) -> bool {
        self.try_acquire_at(cost, Utc::now().timestamp_millis())
    }

    pub fn status(&self) -> LimiterStatus {
        LimiterStatus {
            capacity: self.capacity,
            tokens: self.tokens.trunc().clamp(0.0, f64::from(u32::MAX)) as u32,
            refill_rate: self.refill_rate,
        }
    }
}
