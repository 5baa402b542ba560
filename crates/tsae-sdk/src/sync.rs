//! Session scheduling configuration and sync events.

use crate::error::SdkError;
use crate::network::PeerId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tsae_core::Timestamp;

/// Configuration for anti-entropy sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay before the first periodic round (in milliseconds).
    pub session_delay_ms: u64,
    /// Interval between periodic rounds (in milliseconds).
    pub session_period_ms: u64,
    /// Partners contacted per periodic round.
    pub sessions_per_round: usize,
    /// Sessions started right after each local create or delete.
    pub propagation_degree: usize,
    /// Upper bound on a whole session (in milliseconds).
    pub session_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            session_delay_ms: 0,
            session_period_ms: 10_000,
            sessions_per_round: 1,
            propagation_degree: 0,
            session_timeout_ms: 5_000,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SdkError> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, SdkError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SdkError> {
        if self.session_period_ms == 0 {
            return Err(SdkError::Config("session_period_ms must be positive".into()));
        }
        if self.session_timeout_ms == 0 {
            return Err(SdkError::Config("session_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn session_delay(&self) -> Duration {
        Duration::from_millis(self.session_delay_ms)
    }

    pub fn session_period(&self) -> Duration {
        Duration::from_millis(self.session_period_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

/// Builder for sync configuration.
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn session_delay(mut self, ms: u64) -> Self {
        self.config.session_delay_ms = ms;
        self
    }

    pub fn session_period(mut self, ms: u64) -> Self {
        self.config.session_period_ms = ms;
        self
    }

    pub fn sessions_per_round(mut self, count: usize) -> Self {
        self.config.sessions_per_round = count;
        self
    }

    pub fn propagation_degree(mut self, count: usize) -> Self {
        self.config.propagation_degree = count;
        self
    }

    pub fn session_timeout(mut self, ms: u64) -> Self {
        self.config.session_timeout_ms = ms;
        self
    }

    /// Finish, validating the result.
    pub fn build(self) -> Result<SyncConfig, SdkError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Events emitted by a node.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// A document was created locally.
    DocumentCreated { title: String, timestamp: Timestamp },
    /// A document was removed locally.
    DocumentRemoved { title: String, timestamp: Timestamp },
    /// A session with a peer started.
    SessionStarted(PeerId),
    /// A session with a peer completed.
    SessionCompleted {
        peer: PeerId,
        received: usize,
        accepted: usize,
        sent: usize,
    },
    /// A session with a peer failed.
    SessionFailed { peer: PeerId, error: String },
    /// Garbage collection purged history.
    GarbageCollected {
        operations: usize,
        tombstones: usize,
    },
}
