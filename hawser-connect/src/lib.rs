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

use hawser::{session::Hooks, Pipe, Session};

const SERVICE_NAME: &str = "ssh-connection";

/// Cap of concurrently open channels on one session.
const MAXIMUM_CHANNELS: usize = 10;

mod error;
pub use error::{Error, Result};

mod mux;

mod connect;
pub use connect::Connect;

pub mod channel;
pub mod channel_open;
pub mod global_request;

/// Request the connection service over an established [`Session`] and
/// wrap it into the [`Connect`] channel multiplexer.
pub async fn connect<IO, H>(mut session: Session<IO, H>) -> Result<Connect<IO, H>>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    hawser::service::request(&mut session, SERVICE_NAME).await?;

    Ok(Connect::new(session))
}
