//! Channel Configuration
//!
//! Identity and worker settings for a long-poll channel. The supported-types
//! mapping is fixed when the channel is built and never changes afterwards.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelDirection, SupportedTypes, TransportType};

/// Default identifier of the operations long-poll channel
pub const DEFAULT_CHANNEL_ID: &str = "operations_long_poll_channel";

/// Default name of the channel's worker thread
pub const DEFAULT_WORKER_THREAD_NAME: &str = "synclink-long-poll";

/// Default interval at which a waiting stop repeats its abort
pub const DEFAULT_ABORT_RETRY_MS: u64 = 50;

// ----------------------------------------------------------------------------
// Long Poll Configuration
// ----------------------------------------------------------------------------

/// Configuration for a long-poll data channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongPollConfig {
    /// Immutable channel identifier
    pub channel_id: String,
    /// Transport types this channel carries and in which direction
    pub supported_types: SupportedTypes,
    /// Name given to the background worker thread
    pub worker_thread_name: String,
    /// Whether dropping the channel waits for the worker thread to exit
    pub join_worker_on_drop: bool,
    /// How often a stop waiting on an in-flight exchange repeats the abort
    ///
    /// Covers an abort issued after the cycle's last stop check but before
    /// the transport registered the exchange.
    pub abort_retry_ms: u64,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            channel_id: DEFAULT_CHANNEL_ID.into(),
            supported_types: default_supported_types(),
            worker_thread_name: DEFAULT_WORKER_THREAD_NAME.into(),
            join_worker_on_drop: true,
            abort_retry_ms: DEFAULT_ABORT_RETRY_MS,
        }
    }
}

impl LongPollConfig {
    /// Create configuration for tests
    pub fn testing() -> Self {
        Self {
            channel_id: "test_long_poll_channel".into(),
            worker_thread_name: "synclink-long-poll-test".into(),
            ..Self::default()
        }
    }

    /// Override the channel identifier
    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    /// Override the supported transport types
    pub fn with_supported_types(mut self, supported_types: SupportedTypes) -> Self {
        self.supported_types = supported_types;
        self
    }

    pub fn with_abort_retry_ms(mut self, abort_retry_ms: u64) -> Self {
        self.abort_retry_ms = abort_retry_ms;
        self
    }

    /// Override the worker thread name
    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }
}

/// Types carried by the operations long-poll channel
///
/// Events are delivered by the server but never pushed through this channel.
pub fn default_supported_types() -> SupportedTypes {
    [
        (TransportType::Profile, ChannelDirection::Bidirectional),
        (TransportType::Configuration, ChannelDirection::Bidirectional),
        (TransportType::Notification, ChannelDirection::Bidirectional),
        (TransportType::User, ChannelDirection::Bidirectional),
        (TransportType::Event, ChannelDirection::Down),
    ]
    .into_iter()
    .collect()
}
