//! Core types for synclink data channels
//!
//! This module defines the transport-type vocabulary, the channel-type tag and
//! the server descriptors a channel can be bound to. Server descriptors are a
//! tagged variant so that a channel validates the discriminant before it ever
//! treats the payload as its own kind of server record.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use url::Url;

use crate::errors::{ChannelError, ConfigurationError, CryptographicError};

// ----------------------------------------------------------------------------
// Transport Types
// ----------------------------------------------------------------------------

/// Category of application data carried by a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransportType {
    Bootstrap,
    Profile,
    Configuration,
    Notification,
    User,
    Event,
    Logging,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportType::Bootstrap => "BOOTSTRAP",
            TransportType::Profile => "PROFILE",
            TransportType::Configuration => "CONFIGURATION",
            TransportType::Notification => "NOTIFICATION",
            TransportType::User => "USER",
            TransportType::Event => "EVENT",
            TransportType::Logging => "LOGGING",
        };
        f.write_str(name)
    }
}

/// Direction in which a channel carries a transport type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelDirection {
    /// Client to server only
    Up,
    /// Server to client only
    Down,
    /// Both directions
    Bidirectional,
}

impl ChannelDirection {
    /// Whether the channel may send this type to the server
    pub fn carries_upstream(self) -> bool {
        matches!(self, ChannelDirection::Up | ChannelDirection::Bidirectional)
    }

    /// Whether the channel may receive this type from the server
    pub fn carries_downstream(self) -> bool {
        matches!(self, ChannelDirection::Down | ChannelDirection::Bidirectional)
    }
}

/// Immutable mapping of transport types to the direction a channel carries them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupportedTypes(HashMap<TransportType, ChannelDirection>);

impl SupportedTypes {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Direction for a transport type, if this channel knows it
    pub fn get(&self, transport_type: TransportType) -> Option<ChannelDirection> {
        self.0.get(&transport_type).copied()
    }

    /// Whether the transport type is known to this channel
    pub fn contains(&self, transport_type: TransportType) -> bool {
        self.0.contains_key(&transport_type)
    }

    /// Whether an explicit sync of this transport type is allowed
    ///
    /// Only types carried upstream can be pushed by a sync; a down-only type is
    /// refreshed by the server on its own schedule.
    pub fn is_sync_allowed(&self, transport_type: TransportType) -> bool {
        self.get(transport_type)
            .is_some_and(ChannelDirection::carries_upstream)
    }

    /// Transport types carried upstream, sorted
    pub fn upstream(&self) -> SmallVec<[TransportType; 8]> {
        let mut types: SmallVec<[TransportType; 8]> = self
            .0
            .iter()
            .filter(|(_, direction)| direction.carries_upstream())
            .map(|(transport_type, _)| *transport_type)
            .collect();
        types.sort_unstable();
        types
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (TransportType, ChannelDirection)> + '_ {
        self.0.iter().map(|(t, d)| (*t, *d))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(TransportType, ChannelDirection)> for SupportedTypes {
    fn from_iter<I: IntoIterator<Item = (TransportType, ChannelDirection)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ----------------------------------------------------------------------------
// Channel Type Tag
// ----------------------------------------------------------------------------

/// Wire-level kind of channel a server descriptor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// HTTP long-polling
    HttpLongPoll,
    /// Plain HTTP request/response
    Http,
    /// Persistent TCP
    Tcp,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::HttpLongPoll => write!(f, "HTTP_LP"),
            ChannelType::Http => write!(f, "HTTP"),
            ChannelType::Tcp => write!(f, "TCP"),
        }
    }
}

// ----------------------------------------------------------------------------
// Server Public Key
// ----------------------------------------------------------------------------

/// X25519 public key advertised by a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerPublicKey([u8; 32]);

impl ServerPublicKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ServerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ServerPublicKey {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(clean).map_err(|_| CryptographicError::InvalidKeyFormat)?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptographicError::InvalidKeyFormat)?;
        Ok(Self(key))
    }
}

// ----------------------------------------------------------------------------
// Server Descriptors
// ----------------------------------------------------------------------------

/// Long-poll server record: where to send requests and whose key to encrypt for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongPollServerInfo {
    host: String,
    port: u16,
    url: Url,
    public_key: ServerPublicKey,
}

impl LongPollServerInfo {
    /// Create a server record from its parts
    pub fn new(host: impl Into<String>, port: u16, url: Url, public_key: ServerPublicKey) -> Self {
        Self {
            host: host.into(),
            port,
            url,
            public_key,
        }
    }

    /// Create a server record, taking host and port from the URL
    pub fn from_url(url: Url, public_key: ServerPublicKey) -> Result<Self, ChannelError> {
        let host = url
            .host_str()
            .ok_or_else(|| ConfigurationError::InvalidServerUrl {
                url: url.to_string(),
                reason: "missing host".into(),
            })?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConfigurationError::InvalidServerUrl {
                url: url.to_string(),
                reason: "missing port".into(),
            })?;

        Ok(Self::new(host, port, url, public_key))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL every long-poll request is addressed to
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn public_key(&self) -> &ServerPublicKey {
        &self.public_key
    }
}

/// Host/port/key record for servers reached by non-long-poll channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub host: String,
    pub port: u16,
    pub public_key: ServerPublicKey,
}

/// Server descriptor tagged by the kind of channel it is meant for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerInfo {
    HttpLongPoll(Arc<LongPollServerInfo>),
    Http(Arc<EndpointInfo>),
    Tcp(Arc<EndpointInfo>),
}

impl ServerInfo {
    /// Channel-type discriminant of this descriptor
    pub fn channel_type(&self) -> ChannelType {
        match self {
            ServerInfo::HttpLongPoll(_) => ChannelType::HttpLongPoll,
            ServerInfo::Http(_) => ChannelType::Http,
            ServerInfo::Tcp(_) => ChannelType::Tcp,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ServerInfo::HttpLongPoll(info) => info.host(),
            ServerInfo::Http(info) | ServerInfo::Tcp(info) => &info.host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ServerInfo::HttpLongPoll(info) => info.port(),
            ServerInfo::Http(info) | ServerInfo::Tcp(info) => info.port,
        }
    }

    pub fn public_key(&self) -> &ServerPublicKey {
        match self {
            ServerInfo::HttpLongPoll(info) => info.public_key(),
            ServerInfo::Http(info) | ServerInfo::Tcp(info) => &info.public_key,
        }
    }

    /// The long-poll record, if this descriptor is tagged for long-polling
    pub fn as_long_poll(&self) -> Option<&Arc<LongPollServerInfo>> {
        match self {
            ServerInfo::HttpLongPoll(info) => Some(info),
            _ => None,
        }
    }
}

impl From<LongPollServerInfo> for ServerInfo {
    fn from(info: LongPollServerInfo) -> Self {
        ServerInfo::HttpLongPoll(Arc::new(info))
    }
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.channel_type(), self.host(), self.port())
    }
}
