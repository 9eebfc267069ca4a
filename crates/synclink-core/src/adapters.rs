//! Collaborator interfaces of a data channel
//!
//! A channel sits between the application's data pipeline (multiplexer and
//! demultiplexer) and the registry that knows which servers exist (channel
//! manager). All of these are owned elsewhere; a channel only keeps shared
//! references to them.

use std::sync::Arc;

use crate::errors::Result;
use crate::types::{ChannelType, ServerInfo, SupportedTypes, TransportType};

// ----------------------------------------------------------------------------
// Data Adapters
// ----------------------------------------------------------------------------

/// Serializes pending application data into a request body
pub trait DataMultiplexer: Send + Sync {
    /// Compile all pending data for the given transport types
    fn compile_request(&self, types: &SupportedTypes) -> Result<Vec<u8>>;
}

/// Feeds a decoded response body back into the application
pub trait DataDemultiplexer: Send + Sync {
    fn process_response(&self, response: &[u8]) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Channel Manager
// ----------------------------------------------------------------------------

/// Registry of known servers that reacts to failures
pub trait ChannelManager: Send + Sync {
    /// A channel could not complete an exchange with `server`
    ///
    /// Called outside the channel's own lock, so implementations may rebind the
    /// channel synchronously.
    fn on_server_failed(&self, server: ServerInfo);
}

// ----------------------------------------------------------------------------
// Data Channel
// ----------------------------------------------------------------------------

/// Surface a channel manager drives
pub trait DataChannel: Send + Sync {
    fn id(&self) -> &str;

    fn supported_types(&self) -> &SupportedTypes;

    /// Kind of server descriptor this channel accepts
    fn server_type(&self) -> ChannelType;

    /// Resynchronize one upstream transport type
    fn sync(&self, transport_type: TransportType) -> Result<()>;

    /// Resynchronize everything
    fn sync_all(&self) -> Result<()>;

    /// Bind to a new server and restart
    fn set_server(&self, server: ServerInfo) -> Result<()>;

    fn set_multiplexer(&self, multiplexer: Arc<dyn DataMultiplexer>);

    fn set_demultiplexer(&self, demultiplexer: Arc<dyn DataDemultiplexer>);

    /// Stop polling and release the channel's worker
    fn shutdown(&self);
}
