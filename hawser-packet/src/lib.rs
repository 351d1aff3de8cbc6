#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "![license](https://img.shields.io/crates/l/", env!("CARGO_PKG_NAME"), ")"
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

/// Maximum size for a packet, the maximum size
/// of a channel data packet plus a margin for the protocol overhead.
pub const PACKET_MAX_SIZE: usize = 0x10000 + 3000;

/// Minimum size for a packet, coincidentally this is
/// the largest block cipher's block-size.
pub const PACKET_MIN_SIZE: usize = 16;

mod error;
pub use error::{Error, Result};

mod id;
pub use id::Id;

mod packet;
pub use packet::{CipherCore, IntoPacket, Mac, OpeningCipher, Packet, SealingCipher};

pub mod arch;
pub mod connect;
pub mod kex;
pub mod trans;
pub mod userauth;

#[doc(no_inline)]
pub use binrw;
