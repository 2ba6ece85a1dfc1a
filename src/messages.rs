//! Wire messages exchanged over the voting socket
use serde::{Deserialize, Serialize};

use crate::detector::AnomalyKind;
use crate::error::TallyError;
use crate::poll::Poll;

/// Client -> server messages.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Vote {
        #[serde(rename = "optionIds")]
        option_ids: Vec<String>,
    },
}

/// Server -> client messages. `init` and `update` go out with a full poll
/// snapshot; `error` goes only to the requester.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Init {
        poll: Poll,
    },
    Update {
        poll: Poll,
    },
    Error {
        message: String,
        #[serde(rename = "anomalyDetails", skip_serializing_if = "Option::is_none")]
        anomaly_details: Option<Vec<AnomalyKind>>,
    },
}

impl ServerMessage {
    /// Build the requester-facing error for a rejected vote.
    pub fn rejection(err: &TallyError) -> Self {
        ServerMessage::Error {
            message: err.user_message(),
            anomaly_details: err.anomaly_details().map(|kinds| kinds.to_vec()),
        }
    }
}
