//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub const POLL: &str = "/poll";
pub const WEBSOCKET: &str = "/ws";

pub mod monitoring {
    pub const RATE_LIMIT_STATUS: &str = "/rate-limit/status";
    pub const ANOMALY_STATS: &str = "/anomaly-detection/stats";
    pub const ANOMALY_RECORDS: &str = "/anomaly-detection/records";
    pub const VOTE_HISTORY: &str = "/debug/vote-history";
}
