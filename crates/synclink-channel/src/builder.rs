//! Channel Builder API
//!
//! Collects the channel's fixed identity, key pair and collaborators before the
//! channel exists. Everything except the configuration can still be swapped on
//! the built channel.

use std::sync::{Arc, Weak};

use synclink_core::{
    ChannelManager, ClientKeyPair, DataDemultiplexer, DataMultiplexer, HttpClient, LongPollConfig,
};

use crate::channel::LongPollChannel;
use crate::poller::ChannelCore;
use crate::state::PollState;

// ----------------------------------------------------------------------------
// Long Poll Channel Builder
// ----------------------------------------------------------------------------

/// Builder for [`LongPollChannel`]
pub struct LongPollChannelBuilder {
    config: LongPollConfig,
    keys: ClientKeyPair,
    http: Arc<dyn HttpClient>,
    manager: Option<Weak<dyn ChannelManager>>,
    multiplexer: Option<Arc<dyn DataMultiplexer>>,
    demultiplexer: Option<Arc<dyn DataDemultiplexer>>,
}

impl LongPollChannelBuilder {
    pub fn new(keys: ClientKeyPair, http: Arc<dyn HttpClient>) -> Self {
        Self {
            config: LongPollConfig::default(),
            keys,
            http,
            manager: None,
            multiplexer: None,
            demultiplexer: None,
        }
    }

    /// Set the channel configuration
    pub fn with_config(mut self, config: LongPollConfig) -> Self {
        self.config = config;
        self
    }

    /// Report failed servers to this manager
    ///
    /// Only a weak reference is kept, so a manager may own the channel.
    pub fn with_channel_manager<M: ChannelManager + 'static>(mut self, manager: &Arc<M>) -> Self {
        let manager: Weak<M> = Arc::downgrade(manager);
        self.manager = Some(manager);
        self
    }

    /// Report failed servers to an already type-erased manager
    pub fn with_channel_manager_weak(mut self, manager: Weak<dyn ChannelManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn with_multiplexer(mut self, multiplexer: Arc<dyn DataMultiplexer>) -> Self {
        self.multiplexer = Some(multiplexer);
        self
    }

    pub fn with_demultiplexer(mut self, demultiplexer: Arc<dyn DataDemultiplexer>) -> Self {
        self.demultiplexer = Some(demultiplexer);
        self
    }

    /// Build an idle channel; nothing runs until it is started or bound
    pub fn build(self) -> LongPollChannel {
        let state = PollState::new(self.multiplexer, self.demultiplexer);
        LongPollChannel::from_core(ChannelCore::new(
            self.config,
            self.keys,
            self.http,
            self.manager,
            state,
        ))
    }
}
