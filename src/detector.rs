//! Per-client behavioral anomaly detection
//!
//! Every vote attempt is evaluated against the client's sliding-window
//! history before it is allowed anywhere near the shared ledger or the
//! admission gate. All rules run independently and every match is
//! reported. History records *attempts*, accepted or not.
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::settings::DetectorSettings;

/// Cap on retained anomaly records; older entries are dropped.
const MAX_ANOMALY_RECORDS: usize = 1024;

/// A named rule violation. Serialized names are the wire contract for
/// the `anomalyDetails` field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum AnomalyKind {
    #[serde(rename = "vote_too_frequent")]
    TooFrequent,
    #[serde(rename = "excessive_votes_in_window")]
    ExcessiveInWindow,
    #[serde(rename = "suspicious_selection_pattern")]
    SuspiciousSelection,
    #[serde(rename = "duplicate_vote")]
    DuplicateVote,
}

/// One recorded vote attempt.
#[derive(Clone, Debug)]
struct VoteAttempt {
    timestamp: i64,
    option_ids: Vec<String>,
}

impl VoteAttempt {
    fn selection_set(&self) -> BTreeSet<&str> {
        self.option_ids.iter().map(|s| s.as_str()).collect()
    }
}

#[derive(Clone, Debug, Default)]
struct ClientHistory {
    votes: Vec<VoteAttempt>,
    last_vote_time: Option<i64>,
    anomaly_count: u32,
}

/// Outcome of evaluating one attempt.
#[derive(Clone, Debug)]
pub struct Detection {
    pub anomalies: Vec<AnomalyKind>,
    pub suspicious: bool,
}

impl Detection {
    pub fn is_anomaly(&self) -> bool {
        !self.anomalies.is_empty()
    }
}

/// Retained detail for one anomalous attempt, served by the records endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub client_id: String,
    pub timestamp: i64,
    pub option_ids: Vec<String>,
    pub anomalies: Vec<AnomalyKind>,
    pub vote_count: usize,
    pub anomaly_count: u32,
}

/// Aggregate stats for the monitoring endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorStats {
    pub total_clients: usize,
    pub suspicious_clients: usize,
    pub total_anomalies: u64,
    pub recent_anomalies: Vec<AnomalyRecord>,
    pub config: DetectorSettings,
}

/// Per-client summary for the debug history endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHistorySummary {
    pub client_id: String,
    pub vote_count: usize,
    pub last_vote_time: Option<i64>,
    pub anomaly_count: u32,
}

#[derive(Clone, Debug)]
pub struct AnomalyDetector {
    settings: DetectorSettings,
    clients: HashMap<String, ClientHistory>,
    suspicious: HashSet<String>,
    records: VecDeque<AnomalyRecord>,
    total_anomalies: u64,
}

impl AnomalyDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self {
            settings,
            clients: HashMap::new(),
            suspicious: HashSet::new(),
            records: VecDeque::new(),
            total_anomalies: 0,
        }
    }

    /// Evaluate one vote attempt. The attempt is appended to history and
    /// out-of-window entries pruned regardless of the outcome. A client
    /// already in the suspicious set reports `suspicious = true` even when
    /// this attempt violates no rule on its own.
    pub fn evaluate(
        &mut self,
        client_id: &str,
        option_ids: &[String],
        total_option_count: usize,
        now: i64,
    ) -> Detection {
        let history = self.clients.entry(client_id.to_string()).or_default();
        let window_start = now - self.settings.time_window_ms;
        let mut anomalies = Vec::new();

        // 1. minimum interval between attempts
        if let Some(last) = history.last_vote_time {
            if now - last < self.settings.min_vote_interval_ms {
                anomalies.push(AnomalyKind::TooFrequent);
            }
        }

        // 2. attempts inside the window, counted before this one is appended
        let in_window: Vec<&VoteAttempt> = history
            .votes
            .iter()
            .filter(|v| v.timestamp >= window_start)
            .collect();
        if in_window.len() >= self.settings.max_votes_per_window {
            anomalies.push(AnomalyKind::ExcessiveInWindow);
        }

        // 3. near-universal selection reads as automation
        if total_option_count > 0 {
            let ratio = option_ids.len() as f64 / total_option_count as f64;
            if ratio >= self.settings.all_options_threshold {
                anomalies.push(AnomalyKind::SuspiciousSelection);
            }
        }

        // 4. identical unordered selection to the most recent in-window attempt
        if let Some(last_vote) = in_window.last() {
            let current: BTreeSet<&str> = option_ids.iter().map(|s| s.as_str()).collect();
            if last_vote.selection_set() == current {
                anomalies.push(AnomalyKind::DuplicateVote);
            }
        }

        // Record the attempt unconditionally, then prune the window
        history.votes.push(VoteAttempt {
            timestamp: now,
            option_ids: option_ids.to_vec(),
        });
        history.last_vote_time = Some(now);
        history.votes.retain(|v| v.timestamp >= window_start);

        if !anomalies.is_empty() {
            history.anomaly_count += 1;
            self.total_anomalies += 1;
            let record = AnomalyRecord {
                client_id: client_id.to_string(),
                timestamp: now,
                option_ids: option_ids.to_vec(),
                anomalies: anomalies.clone(),
                vote_count: history.votes.len(),
                anomaly_count: history.anomaly_count,
            };
            if history.anomaly_count >= self.settings.suspicious_vote_threshold {
                self.suspicious.insert(client_id.to_string());
            }
            self.records.push_back(record);
            if self.records.len() > MAX_ANOMALY_RECORDS {
                self.records.pop_front();
            }
        }

        Detection {
            anomalies,
            suspicious: self.suspicious.contains(client_id),
        }
    }

    pub fn is_suspicious(&self, client_id: &str) -> bool {
        self.suspicious.contains(client_id)
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            total_clients: self.clients.len(),
            suspicious_clients: self.suspicious.len(),
            total_anomalies: self.total_anomalies,
            recent_anomalies: self.records.iter().rev().take(10).cloned().collect(),
            config: self.settings,
        }
    }

    /// Most recent anomaly records, newest first.
    pub fn recent_records(&self, limit: usize) -> Vec<AnomalyRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    /// Per-client history summaries for debugging.
    pub fn client_histories(&self) -> Vec<ClientHistorySummary> {
        self.clients
            .iter()
            .map(|(client_id, h)| ClientHistorySummary {
                client_id: client_id.clone(),
                vote_count: h.votes.len(),
                last_vote_time: h.last_vote_time,
                anomaly_count: h.anomaly_count,
            })
            .collect()
    }

    /// Drop histories whose last attempt is older than several detection
    /// windows, so the client map does not grow without bound. Suspicious-set
    /// membership is separate state and survives a sweep.
    pub fn sweep_stale(&mut self, now: i64) -> usize {
        let cutoff = now - self.settings.time_window_ms * 5;
        let before = self.clients.len();
        self.clients
            .retain(|_, h| matches!(h.last_vote_time, Some(t) if t >= cutoff));
        before - self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(DetectorSettings::default())
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_clean_vote_passes() {
        let mut d = detector();
        let result = d.evaluate("c1", &ids(&["1"]), 3, 1_000_000);
        assert!(!result.is_anomaly());
        assert!(!result.suspicious);
    }

    #[test]
    fn too_frequent_fires_within_min_interval() {
        let mut d = detector();
        let t0 = 1_000_000;
        assert!(!d.evaluate("c1", &ids(&["1"]), 3, t0).is_anomaly());
        let result = d.evaluate("c1", &ids(&["2"]), 3, t0 + 500);
        assert!(result.anomalies.contains(&AnomalyKind::TooFrequent));
        // a different selection 500ms later is not a duplicate
        assert!(!result.anomalies.contains(&AnomalyKind::DuplicateVote));
    }

    #[test]
    fn excessive_votes_in_window() {
        let mut d = detector();
        let t0 = 1_000_000;
        // five spaced-out attempts fill the window quota
        for n in 0..5 {
            let result = d.evaluate("c1", &ids(&[&n.to_string()]), 10, t0 + n * 2000);
            assert!(!result.anomalies.contains(&AnomalyKind::ExcessiveInWindow));
        }
        let result = d.evaluate("c1", &ids(&["9"]), 10, t0 + 12_000);
        assert!(result.anomalies.contains(&AnomalyKind::ExcessiveInWindow));
    }

    #[test]
    fn window_prunes_old_attempts() {
        let mut d = detector();
        let t0 = 1_000_000;
        for n in 0..5 {
            d.evaluate("c1", &ids(&[&n.to_string()]), 10, t0 + n * 2000);
        }
        // 61s after the last attempt everything has aged out
        let result = d.evaluate("c1", &ids(&["9"]), 10, t0 + 8000 + 61_000);
        assert!(!result.anomalies.contains(&AnomalyKind::ExcessiveInWindow));
        let summary = &d.client_histories()[0];
        assert_eq!(summary.vote_count, 1);
    }

    #[test]
    fn near_universal_selection_flagged_on_first_attempt() {
        let mut d = detector();
        let result = d.evaluate("c1", &ids(&["1", "2", "3"]), 3, 1_000_000);
        assert!(result
            .anomalies
            .contains(&AnomalyKind::SuspiciousSelection));

        // 2 of 3 is below the default 0.8 threshold
        let result = d.evaluate("c2", &ids(&["1", "2"]), 3, 1_000_000);
        assert!(!result
            .anomalies
            .contains(&AnomalyKind::SuspiciousSelection));
    }

    #[test]
    fn duplicate_detected_as_unordered_set() {
        let mut d = detector();
        let t0 = 1_000_000;
        d.evaluate("c1", &ids(&["1", "2"]), 10, t0);
        let result = d.evaluate("c1", &ids(&["2", "1"]), 10, t0 + 5000);
        assert!(result.anomalies.contains(&AnomalyKind::DuplicateVote));
    }

    #[test]
    fn all_matching_rules_reported_together() {
        let mut d = detector();
        let t0 = 1_000_000;
        d.evaluate("c1", &ids(&["1", "2", "3"]), 3, t0);
        let result = d.evaluate("c1", &ids(&["3", "2", "1"]), 3, t0 + 100);
        assert!(result.anomalies.contains(&AnomalyKind::TooFrequent));
        assert!(result
            .anomalies
            .contains(&AnomalyKind::SuspiciousSelection));
        assert!(result.anomalies.contains(&AnomalyKind::DuplicateVote));
    }

    #[test]
    fn escalation_is_permanent() {
        let mut d = detector();
        let t0 = 1_000_000;
        // three anomalous attempts (full selection each time) cross the threshold
        for n in 0..3 {
            d.evaluate("c1", &ids(&["1", "2", "3"]), 3, t0 + n * 5000);
        }
        assert!(d.is_suspicious("c1"));

        // a later attempt violating no rule on its own is still suspicious
        let result = d.evaluate("c1", &ids(&["9"]), 3, t0 + 200_000);
        assert!(!result.is_anomaly());
        assert!(result.suspicious);
    }

    #[test]
    fn history_updates_even_for_rejected_attempts() {
        let mut d = detector();
        let t0 = 1_000_000;
        d.evaluate("c1", &ids(&["1", "2", "3"]), 3, t0);
        d.evaluate("c1", &ids(&["1", "2", "3"]), 3, t0 + 5000);
        let summary = &d.client_histories()[0];
        assert_eq!(summary.vote_count, 2);
        assert_eq!(summary.anomaly_count, 2);
        assert_eq!(summary.last_vote_time, Some(t0 + 5000));
    }

    #[test]
    fn stats_and_records_track_anomalies() {
        let mut d = detector();
        let t0 = 1_000_000;
        d.evaluate("c1", &ids(&["1"]), 3, t0);
        d.evaluate("c1", &ids(&["1", "2", "3"]), 3, t0 + 5000);
        d.evaluate("c2", &ids(&["1", "2", "3"]), 3, t0);

        let stats = d.stats();
        assert_eq!(stats.total_clients, 2);
        assert_eq!(stats.total_anomalies, 2);
        assert_eq!(stats.suspicious_clients, 0);

        let records = d.recent_records(20);
        assert_eq!(records.len(), 2);
        // newest first
        assert_eq!(records[0].client_id, "c2");
    }

    #[test]
    fn sweep_removes_idle_clients_but_keeps_suspicion() {
        let mut d = detector();
        let t0 = 1_000_000;
        for n in 0..3 {
            d.evaluate("bot", &ids(&["1", "2", "3"]), 3, t0 + n * 5000);
        }
        d.evaluate("fresh", &ids(&["1"]), 3, t0 + 400_000);
        assert!(d.is_suspicious("bot"));

        let removed = d.sweep_stale(t0 + 400_000);
        assert_eq!(removed, 1);
        assert_eq!(d.stats().total_clients, 1);
        // the flag outlives the history
        assert!(d.is_suspicious("bot"));
        assert!(d.evaluate("bot", &ids(&["1"]), 3, t0 + 401_000).suspicious);
    }

    #[test]
    fn record_log_is_bounded() {
        let mut d = detector();
        let t0 = 1_000_000;
        for n in 0..(MAX_ANOMALY_RECORDS as i64 + 50) {
            // unique client per attempt so each full selection is one anomaly
            d.evaluate(&format!("c{}", n), &ids(&["1", "2", "3"]), 3, t0 + n);
        }
        assert_eq!(d.recent_records(usize::MAX).len(), MAX_ANOMALY_RECORDS);
        assert_eq!(d.stats().total_anomalies, MAX_ANOMALY_RECORDS as u64 + 50);
    }
}
