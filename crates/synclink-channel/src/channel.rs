//! Long-poll operations channel
//!
//! Public face of the channel. Every operation here may be called from any
//! thread; they all serialize on the channel lock inside [`ChannelCore`].

use std::sync::Arc;

use synclink_core::{
    ChannelType, ClientKeyPair, ConfigurationError, DataChannel, DataDemultiplexer,
    DataMultiplexer, EncoderDecoder, HttpClient, HttpDataProcessor, LongPollServerInfo, Result,
    ServerInfo, SupportedTypes, TransportType,
};
use tracing::{error, info, warn};

use crate::builder::LongPollChannelBuilder;
use crate::poller::ChannelCore;
use crate::state::PollPhase;

/// Data channel that keeps application data in sync through HTTP long-polling
pub struct LongPollChannel {
    core: Arc<ChannelCore>,
}

impl LongPollChannel {
    /// Start building a channel
    pub fn builder(keys: ClientKeyPair, http: Arc<dyn HttpClient>) -> LongPollChannelBuilder {
        LongPollChannelBuilder::new(keys, http)
    }

    pub(crate) fn from_core(core: ChannelCore) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    pub fn id(&self) -> &str {
        self.core.id()
    }

    pub fn supported_types(&self) -> &SupportedTypes {
        &self.core.config.supported_types
    }

    pub fn server_type(&self) -> ChannelType {
        ChannelType::HttpLongPoll
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Begin polling; creates the worker on the first call
    pub fn start(&self) -> Result<()> {
        self.core.start()
    }

    /// Stop polling, blocking until an in-flight request has terminated
    pub fn stop(&self) {
        self.core.stop()
    }

    /// Stop polling and release the worker; the channel cannot be started again
    pub fn shutdown(&self) {
        self.core.shutdown()
    }

    pub fn phase(&self) -> PollPhase {
        self.core.phase()
    }

    pub fn is_running(&self) -> bool {
        !self.core.lock_state().stopped
    }

    pub fn current_server(&self) -> Option<Arc<LongPollServerInfo>> {
        self.core.lock_state().current_server.clone()
    }

    // ------------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------------

    /// Resynchronize one transport type carried upstream by this channel
    pub fn sync(&self, transport_type: TransportType) -> Result<()> {
        if !self.supported_types().is_sync_allowed(transport_type) {
            error!(
                channel_id = %self.id(),
                %transport_type,
                "unsupported transport type for channel"
            );
            return Err(ConfigurationError::UnsupportedTransportType {
                channel_id: self.id().into(),
                transport_type,
            }
            .into());
        }

        self.restart()
    }

    /// Resynchronize everything
    pub fn sync_all(&self) -> Result<()> {
        self.restart()
    }

    fn restart(&self) -> Result<()> {
        if self.core.lock_state().current_server.is_none() {
            warn!(channel_id = %self.id(), "can't sync channel, server is not set");
            return Ok(());
        }

        self.core.stop();
        self.core.start()
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    /// Bind to a new long-poll server and restart polling against it
    pub fn set_server(&self, server: ServerInfo) -> Result<()> {
        let Some(info) = server.as_long_poll() else {
            error!(
                channel_id = %self.id(),
                server_type = %server.channel_type(),
                "invalid server info for channel"
            );
            return Err(ConfigurationError::InvalidServerType {
                channel_id: self.id().into(),
                expected: ChannelType::HttpLongPoll,
                actual: server.channel_type(),
            }
            .into());
        };

        let encoder = EncoderDecoder::new(&self.core.keys, *info.public_key())?;
        let info = Arc::clone(info);

        self.core.stop();
        {
            let mut state = self.core.lock_state();
            state.current_server = Some(Arc::clone(&info));
            state.processor = Some(HttpDataProcessor::new(encoder));
        }
        info!(
            channel_id = %self.id(),
            host = %info.host(),
            port = info.port(),
            "bound long-poll server"
        );

        self.core.start()
    }

    pub fn set_multiplexer(&self, multiplexer: Arc<dyn DataMultiplexer>) {
        self.core.lock_state().multiplexer = Some(multiplexer);
    }

    pub fn set_demultiplexer(&self, demultiplexer: Arc<dyn DataDemultiplexer>) {
        self.core.lock_state().demultiplexer = Some(demultiplexer);
    }
}

impl DataChannel for LongPollChannel {
    fn id(&self) -> &str {
        LongPollChannel::id(self)
    }

    fn supported_types(&self) -> &SupportedTypes {
        LongPollChannel::supported_types(self)
    }

    fn server_type(&self) -> ChannelType {
        LongPollChannel::server_type(self)
    }

    fn sync(&self, transport_type: TransportType) -> Result<()> {
        LongPollChannel::sync(self, transport_type)
    }

    fn sync_all(&self) -> Result<()> {
        LongPollChannel::sync_all(self)
    }

    fn set_server(&self, server: ServerInfo) -> Result<()> {
        LongPollChannel::set_server(self, server)
    }

    fn set_multiplexer(&self, multiplexer: Arc<dyn DataMultiplexer>) {
        LongPollChannel::set_multiplexer(self, multiplexer)
    }

    fn set_demultiplexer(&self, demultiplexer: Arc<dyn DataDemultiplexer>) {
        LongPollChannel::set_demultiplexer(self, demultiplexer)
    }

    fn shutdown(&self) {
        LongPollChannel::shutdown(self)
    }
}

impl Drop for LongPollChannel {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}
