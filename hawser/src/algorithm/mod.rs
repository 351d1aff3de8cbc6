//! Supported algorithms for **key-exchange**, **host keys**, **encryption**,
//! **integrity** and **compression**.

use hawser_packet::{arch::NameList, trans::KexInit};

use crate::{Error, Result};

mod cipher;
pub use cipher::Cipher;
pub(crate) use cipher::CipherState;

mod compress;
pub use compress::Compress;
pub(crate) use compress::CompressState;

mod hmac;
pub use hmac::Hmac;

pub(crate) mod kex;
pub use kex::Kex;

pub(crate) mod key;
pub use key::{HostKey, Key};

/// Marker for the _client to server_ direction of an algorithm slot.
pub(crate) struct Tx;

/// Marker for the _server to client_ direction of an algorithm slot.
pub(crate) struct Rx;

/// Negociation of an algorithm slot between the two `SSH_MSG_KEXINIT`
/// messages, by picking the first client-offered name that also appears
/// in the server's offer.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-7.1>.
pub(crate) trait Negociate<D = ()>: std::str::FromStr + Sized {
    /// The error reported when the slot admits no common algorithm.
    const ERR: Error;

    /// Project the negociated slot's name-list out of a [`KexInit`] message.
    fn field<'f>(kexinit: &'f KexInit) -> &'f NameList<'f>;

    /// Select the algorithm for this slot.
    fn negociate(kexinit: &KexInit, peerkexinit: &KexInit) -> Result<Self> {
        Self::field(kexinit)
            .preferred_in(Self::field(peerkexinit))
            .ok_or(Self::ERR)?
            .parse()
            .map_err(|_| Self::ERR)
    }
}
