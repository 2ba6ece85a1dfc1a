use std::sync::{Arc, Mutex};

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::service::VoteCore;
use crate::settings::Settings;

pub type SharedState = Arc<AppState>;

/// Shared application state: the coarse-locked vote core plus the
/// session registry. The registry has its own internal lock so the
/// broadcast fan-out never runs under the core lock.
#[derive(Debug)]
pub struct AppState {
    pub core: Mutex<VoteCore>,
    pub registry: Broadcaster,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Result<SharedState> {
        Ok(Arc::new(Self {
            core: Mutex::new(VoteCore::from_settings(settings)?),
            registry: Broadcaster::new(),
        }))
    }
}
