//! CLI for this application
//!
use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
pub struct Cli {
    // Server listen address
    #[clap(
        long,
        default_value = "0.0.0.0",
        env("TALLY_LISTEN_ADDRESS"),
        help = "IP Address to listen on"
    )]
    pub listen_address: String,

    // HTTP API listen port
    #[clap(
        long,
        default_value = settings::DEFAULT_PORT_HTTP,
        env("TALLY_HTTP_LISTEN_PORT"),
        help = "Port to bind the Tally HTTP/WebSocket server to"
    )]
    pub listen_port: u16,

    // Admission control: bucket capacity
    #[clap(
        long,
        default_value = "1000",
        env("TALLY_LIMITER_CAPACITY"),
        help = "Max tokens held by the global vote admission bucket"
    )]
    pub limiter_capacity: u32,

    // Admission control: refill rate
    #[clap(
        long,
        default_value = "1000",
        env("TALLY_LIMITER_REFILL_RATE"),
        help = "Tokens added back to the admission bucket per second"
    )]
    pub limiter_refill_rate: u32,

    // Anomaly detection: sliding window
    #[clap(
        long,
        default_value = "60000",
        env("TALLY_DETECTOR_WINDOW_MS"),
        help = "Sliding window over each client's vote attempts, in milliseconds"
    )]
    pub detector_window_ms: i64,

    // Anomaly detection: window quota
    #[clap(
        long,
        default_value = "5",
        env("TALLY_MAX_VOTES_PER_WINDOW"),
        help = "Max vote attempts per client inside one window"
    )]
    pub max_votes_per_window: usize,

    // Anomaly detection: minimum spacing between attempts
    #[clap(
        long,
        default_value = "1000",
        env("TALLY_MIN_VOTE_INTERVAL_MS"),
        help = "Minimum interval between two attempts from one client, in milliseconds"
    )]
    pub min_vote_interval_ms: i64,

    // Anomaly detection: near-universal selection threshold
    #[clap(
        long,
        default_value = "0.8",
        env("TALLY_ALL_OPTIONS_THRESHOLD"),
        help = "Fraction of options selected at once that is flagged as automation"
    )]
    pub all_options_threshold: f64,

    // Anomaly detection: escalation threshold
    #[clap(
        long,
        default_value = "3",
        env("TALLY_SUSPICIOUS_VOTE_THRESHOLD"),
        help = "Cumulative anomaly count at which a client is flagged permanently"
    )]
    pub suspicious_vote_threshold: u32,

    // Poll definition
    #[clap(
        long,
        default_value = settings::DEFAULT_POLL_QUESTION,
        env("TALLY_POLL_QUESTION"),
        help = "Question text for the single active poll"
    )]
    pub poll_question: String,

    #[clap(
        long,
        env("TALLY_POLL_OPTIONS"),
        value_delimiter = ',',
        help = "Poll options as 'id:text' pairs (e.g. 1:JavaScript,2:Python,3:Go)"
    )]
    pub poll_options: Vec<String>,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        let poll_options = if self.poll_options.is_empty() {
            settings::DEFAULT_POLL_OPTIONS
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.poll_options
        };
        settings::Settings {
            listen_address: self.listen_address,
            listen_port: self.listen_port,
            limiter: settings::LimiterSettings {
                capacity: self.limiter_capacity,
                refill_rate: self.limiter_refill_rate,
            },
            detector: settings::DetectorSettings {
                time_window_ms: self.detector_window_ms,
                max_votes_per_window: self.max_votes_per_window,
                min_vote_interval_ms: self.min_vote_interval_ms,
                all_options_threshold: self.all_options_threshold,
                suspicious_vote_threshold: self.suspicious_vote_threshold,
            },
            poll_question: self.poll_question,
            poll_options,
        }
    }
}
