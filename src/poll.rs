//! Poll state and the vote ledger
//!
//! The ledger is the only place vote counts are mutated. It does no
//! validation of its own: callers are expected to have run the anomaly
//! and admission checks first.
use serde::{Deserialize, Serialize};

/// One selectable choice with a running vote count.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PollOption {
    pub id: String,
    pub text: String,
    pub votes: u64,
}

impl PollOption {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            votes: 0,
        }
    }
}

/// The single active poll. Cloned copies serve as immutable snapshots
/// for broadcast, so the wire shape is just this struct.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<PollOption>,
}

/// Owns the poll and applies accepted votes to it.
#[derive(Clone, Debug)]
pub struct VoteLedger {
    poll: Poll,
}

impl VoteLedger {
    pub fn new(poll: Poll) -> Self {
        Self { poll }
    }

    /// Point-in-time copy of the poll for init messages and broadcasts.
    pub fn snapshot(&self) -> Poll {
        self.poll.clone()
    }

    pub fn option_count(&self) -> usize {
        self.poll.options.len()
    }

    /// Increment each matched option by exactly one and return the updated
    /// snapshot. Unknown option ids are skipped without error.
    pub fn apply_vote(&mut self, option_ids: &[String]) -> Poll {
        for id in option_ids {
            if let Some(opt) = self.poll.options.iter_mut().find(|o| &o.id == id) {
                opt.votes += 1;
            }
        }
        self.snapshot()
    }

    /// Total votes recorded across all options.
    pub fn total_votes(&self) -> u64 {
        self.poll.options.iter().map(|o| o.votes).sum()
    }
}
