//! Synclink Long-Poll Channel
//!
//! Client-side channel that keeps application data synchronized with a server
//! over HTTP long-polling. A single background worker repeatedly builds a
//! request from the multiplexer, blocks on the server, feeds the response to
//! the demultiplexer and immediately polls again. The channel can be started,
//! stopped (even mid-request), rebound to another server and told to resync
//! from any thread.
//!
//! ```no_run
//! use std::sync::Arc;
//! use synclink_channel::LongPollChannel;
//! # use synclink_core::{ClientKeyPair, HttpClient, LongPollConfig, ServerInfo};
//! # fn demo(http: Arc<dyn HttpClient>, server: ServerInfo) -> synclink_core::Result<()> {
//! let channel = LongPollChannel::builder(ClientKeyPair::generate(), http)
//!     .with_config(LongPollConfig::default())
//!     .build();
//! channel.set_server(server)?;
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

mod builder;
mod channel;
mod cycle;
mod poller;
mod state;
mod worker;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use builder::LongPollChannelBuilder;
pub use channel::LongPollChannel;
pub use state::PollPhase;
