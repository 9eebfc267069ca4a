//! Synclink Core
//!
//! This crate provides the foundational types, error taxonomy, cryptographic
//! context and HTTP data processing shared by synclink data channels. The
//! channel implementations themselves live in sibling crates and only talk to
//! the outside world through the collaborator traits defined in [`adapters`]
//! and [`http`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod adapters;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod http;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use adapters::{ChannelManager, DataChannel, DataDemultiplexer, DataMultiplexer};
pub use config::LongPollConfig;
pub use crypto::{ClientKeyPair, EncoderDecoder, ServerCipher};
pub use errors::{
    ChannelError, ConfigurationError, CryptographicError, Result, TransportError,
};
pub use http::{HttpClient, HttpDataProcessor, HttpResponse, MultipartPostRequest};
pub use types::{
    ChannelDirection, ChannelType, EndpointInfo, LongPollServerInfo, ServerInfo,
    ServerPublicKey, SupportedTypes, TransportType,
};
