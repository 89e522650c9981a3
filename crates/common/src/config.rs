//! Engine configuration for mux sessions.

use serde::{Deserialize, Serialize};

/// What a producer does when its track queue is full.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushPolicy {
    /// Wait until the scheduler frees a slot.
    #[default]
    Block,
    /// Return `BufferFull` immediately.
    Fail,
}

/// Tunables shared by every track of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxerConfig {
    /// Maximum outstanding samples per track queue.
    pub queue_capacity: usize,
    pub push_policy: PushPolicy,
    /// Upper bound on one scheduler wait, in milliseconds.
    pub wait_timeout_ms: u64,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            push_policy: PushPolicy::Block,
            wait_timeout_ms: 500,
        }
    }
}

impl MuxerConfig {
    pub fn wait_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.wait_timeout_ms)
    }
}
