//! Error types for synclink channels
//!
//! Errors fall into three groups that callers treat differently:
//! configuration errors are reported synchronously and never touch the poll
//! state, transport errors end the current request cycle (cleanly when the
//! exchange was aborted by a stop, as a server failure otherwise), and
//! cryptographic/data errors make a response unusable.

use crate::types::{ChannelType, TransportType};

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Misconfiguration of a channel or of one of its collaborators
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("No server is bound to channel {channel_id}")]
    MissingServer { channel_id: String },
    #[error("No multiplexer is set for channel {channel_id}")]
    MissingMultiplexer { channel_id: String },
    #[error("No demultiplexer is set for channel {channel_id}")]
    MissingDemultiplexer { channel_id: String },
    #[error("Invalid server info for channel {channel_id}: expected {expected}, got {actual}")]
    InvalidServerType {
        channel_id: String,
        expected: ChannelType,
        actual: ChannelType,
    },
    #[error("Unsupported transport type {transport_type} for channel {channel_id}")]
    UnsupportedTransportType {
        channel_id: String,
        transport_type: TransportType,
    },
    #[error("Invalid server URL {url}: {reason}")]
    InvalidServerUrl { url: String, reason: String },
    #[error("Worker for channel {channel_id} is unavailable: {reason}")]
    WorkerUnavailable { channel_id: String, reason: String },
}

/// Network exchange failures
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed to server {host}:{port}: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Connection was aborted")]
    Aborted,
    #[error("Request timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("Server responded with HTTP status {status}")]
    HttpStatus { status: u16 },
    #[error("Network I/O error: {0}")]
    NetworkIo(#[from] std::io::Error),
}

/// Cryptographic context failures
#[derive(Debug, thiserror::Error)]
pub enum CryptographicError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid key format")]
    InvalidKeyFormat,
    #[error("Key agreement with server key produced a non-contributory secret")]
    NonContributoryKey,
    #[error("Malformed ciphertext ({len} bytes)")]
    MalformedCiphertext { len: usize },
    #[error("Missing request field: {field}")]
    MissingField { field: String },
    #[error("Signature verification failed")]
    SignatureVerificationFailed,
}

// ----------------------------------------------------------------------------
// Channel Error
// ----------------------------------------------------------------------------

/// Unified error type for channel operations and request cycles
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptographicError),

    /// Raised by data adapters while compiling or processing payloads
    #[error("Data processing error: {reason}")]
    Data { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Constructors & Classification
// ----------------------------------------------------------------------------

impl ChannelError {
    /// Create a data processing error with a reason
    pub fn data_error<T: Into<String>>(reason: T) -> Self {
        ChannelError::Data {
            reason: reason.into(),
        }
    }

    /// Create a connection failed error
    pub fn connection_failed<H: Into<String>, R: Into<String>>(host: H, port: u16, reason: R) -> Self {
        ChannelError::Transport(TransportError::ConnectionFailed {
            host: host.into(),
            port,
            reason: reason.into(),
        })
    }

    /// Create an aborted-connection error
    pub fn aborted() -> Self {
        ChannelError::Transport(TransportError::Aborted)
    }

    /// Whether this error is a misconfiguration rather than a runtime failure
    pub fn is_configuration(&self) -> bool {
        matches!(self, ChannelError::Configuration(_))
    }

    /// Whether the exchange ended because someone asked it to
    pub fn is_abort(&self) -> bool {
        matches!(self, ChannelError::Transport(TransportError::Aborted))
    }

    /// Short stable label for log fields
    pub fn label(&self) -> &'static str {
        match self {
            ChannelError::Configuration(_) => "configuration",
            ChannelError::Transport(TransportError::Aborted) => "aborted",
            ChannelError::Transport(TransportError::Timeout { .. }) => "timeout",
            ChannelError::Transport(TransportError::HttpStatus { .. }) => "http_status",
            ChannelError::Transport(_) => "transport",
            ChannelError::Crypto(_) => "crypto",
            ChannelError::Data { .. } => "data",
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ChannelError>;
