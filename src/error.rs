//! Error types for the GG client.

use thiserror::Error;

/// Errors raised while decoding a frame payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload ended before a field could be read.
    #[error("unexpected end of payload: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the field needed.
        needed: usize,
        /// Bytes left in the payload.
        remaining: usize,
    },

    /// An offset field points outside the payload.
    #[error("offset {offset} outside payload of {len} bytes")]
    InvalidOffset {
        /// Offset read from the frame.
        offset: usize,
        /// Payload length.
        len: usize,
    },

    /// A field held a value the protocol does not allow.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Top-level client errors.
#[derive(Debug, Error)]
pub enum GGError {
    /// The operation needs a logged-in session.
    #[error("not logged in to the GG network")]
    NotAuthenticated,

    /// Connect was requested while a connection is already in progress or open.
    #[error("already connected, disconnect first")]
    AlreadyConnected,

    /// Disconnect was requested without a connection.
    #[error("not connected")]
    NotConnected,

    /// The peer announced a frame larger than the configured cap.
    #[error("frame length {length} exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Announced payload length.
        length: u32,
        /// Configured cap.
        max: u32,
    },

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Socket or file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server discovery collaborator failed or is missing.
    #[error("server discovery failed: {0}")]
    Discovery(String),

    /// The contact list collaborator failed or is missing.
    #[error("contact list error: {0}")]
    ContactList(String),

    /// A request was rejected before reaching the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GGError>;
