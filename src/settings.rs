//! Tally application settings
use crate::error::{Result, TallyError};
use crate::poll::{Poll, PollOption};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const STANDARD_PORT_HTTP: u16 = 4000;
pub const DEFAULT_PORT_HTTP: &str = "4000";

pub const DEFAULT_POLL_ID: &str = "poll-1";
pub const DEFAULT_POLL_QUESTION: &str = "What is your favorite language?";
pub const DEFAULT_POLL_OPTIONS: [&str; 3] = ["1:JavaScript", "2:Python", "3:Go"];

/// Global admission-control settings for the vote token bucket.
#[derive(Clone, Copy, Debug)]
pub struct LimiterSettings {
    /// Maximum tokens the bucket can hold
    pub capacity: u32,
    /// Tokens added back per second
    pub refill_rate: u32,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            refill_rate: 1000,
        }
    }
}

/// Per-client behavioral detection settings.
#[derive(Clone, Copy, Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorSettings {
    /// Sliding window over a client's vote attempts, in milliseconds
    pub time_window_ms: i64,
    /// Max vote attempts allowed inside one window
    pub max_votes_per_window: usize,
    /// Minimum interval between two attempts from one client, in milliseconds
    pub min_vote_interval_ms: i64,
    /// Fraction of options selected at once that reads as automation
    pub all_options_threshold: f64,
    /// Cumulative anomaly count at which a client is flagged permanently
    pub suspicious_vote_threshold: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            time_window_ms: 60_000,
            max_votes_per_window: 5,
            min_vote_interval_ms: 1000,
            all_options_threshold: 0.8,
            suspicious_vote_threshold: 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Server listen address
    pub listen_address: String,

    // HTTP API listen port
    pub listen_port: u16,

    pub limiter: LimiterSettings,
    pub detector: DetectorSettings,

    // Poll definition: question plus "id:text" option pairs
    pub poll_question: String,
    pub poll_options: Vec<String>,
}

impl Settings {
    /// Build the single process-lifetime poll from the configured
    /// question and "id:text" option pairs.
    pub fn build_poll(&self) -> Result<Poll> {
        let mut options: Vec<PollOption> = Vec::with_capacity(self.poll_options.len());
        for pair in &self.poll_options {
            let (id, text) = pair.split_once(':').ok_or_else(|| {
                TallyError::Config(format!("poll option must be 'id:text', got '{}'", pair))
            })?;
            if id.is_empty() || text.is_empty() {
                return Err(TallyError::Config(format!(
                    "poll option has empty id or text: '{}'",
                    pair
                )));
            }
            if options.iter().any(|o| o.id == id) {
                return Err(TallyError::Config(format!(
                    "duplicate poll option id '{}'",
                    id
                )));
            }
            options.push(PollOption::new(id, text));
        }
        if options.is_empty() {
            return Err(TallyError::Config("poll needs at least one option".into()));
        }
        Ok(Poll {
            id: DEFAULT_POLL_ID.to_string(),
            question: self.poll_question.clone(),
            options,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: STANDARD_PORT_HTTP,
            limiter: LimiterSettings::default(),
            detector: DetectorSettings::default(),
            poll_question: DEFAULT_POLL_QUESTION.to_string(),
            poll_options: DEFAULT_POLL_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
