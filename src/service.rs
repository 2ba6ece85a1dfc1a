//! Vote pipeline orchestration
//!
//! Order matters: behavioral rules run before the admission gate, so an
//! anomalous or suspicious request never consumes a rate-limit token and
//! never reaches the shared counters. The ledger is touched last.
use chrono::Utc;
use tracing::{debug, info};

use crate::detector::AnomalyDetector;
use crate::error::{Result, TallyError};
use crate::limiter::TokenBucket;
use crate::poll::{Poll, VoteLedger};
use crate::settings::Settings;

/// All shared mutable vote state, guarded by one coarse lock at the
/// call site. Vote processing is CPU-cheap; finer-grained locking is
/// not worth the trouble here.
#[derive(Debug)]
pub struct VoteCore {
    pub ledger: VoteLedger,
    pub limiter: TokenBucket,
    pub detector: AnomalyDetector,
}

impl VoteCore {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            ledger: VoteLedger::new(settings.build_poll()?),
            limiter: TokenBucket::new(&settings.limiter),
            detector: AnomalyDetector::new(settings.detector),
        })
    }

    /// Run one vote through detector, limiter, and ledger, short-circuiting
    /// on first rejection. Returns the updated snapshot for broadcast.
    pub fn handle_vote(&mut self, client_id: &str, option_ids: &[String]) -> Result<Poll> {
        self.handle_vote_at(client_id, option_ids, Utc::now().timestamp_millis())
    }

    /// Same as [`handle_vote`](Self::handle_vote) with an explicit clock.
    pub fn handle_vote_at(
        &mut self,
        client_id: &str,
        option_ids: &[String],
        now: i64,
    ) -> Result<Poll> {
        let detection =
            self.detector
                .evaluate(client_id, option_ids, self.ledger.option_count(), now);
        if detection.suspicious {
            info!(client_id, "vote rejected: suspicious client");
            return Err(TallyError::Suspicious(detection.anomalies));
        }
        if detection.is_anomaly() {
            info!(client_id, anomalies = ?detection.anomalies, "vote rejected: anomalous");
            return Err(TallyError::Anomalous(detection.anomalies));
        }

        if !self.limiter.try_acquire_at(1, now) {
            debug!(client_id, "vote rejected: rate limited");
            return Err(TallyError::RateLimited);
        }

        let snapshot = self.ledger.apply_vote(option_ids);
        debug!(client_id, total_votes = self.ledger.total_votes(), "vote applied");
        Ok(snapshot)
    }
}
