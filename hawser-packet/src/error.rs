//! Collection of error handling types and aliases.

use thiserror::Error;

/// The error types that can occur while manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while reading or writing a packet.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Binary (de)-serialization error.
    #[error(transparent)]
    Binary(#[from] binrw::Error),

    /// The parsed identifier was not conformant.
    #[error("The SSH identifier was either misformatted or misprefixed: {0:?}")]
    BadIdentifer(String),

    /// The peer's protocol version is not supported.
    #[error("The SSH protocol version `{0}` is unsupported")]
    UnsupportedVersion(String),

    /// The peer sent a packet that does not respect the framing invariants.
    #[error("The packet is malformed: {0}")]
    MalformedPacket(&'static str),

    /// The stream ended while awaiting more data.
    #[error("Unexpectedly reached end-of-file")]
    UnexpectedEof,
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
