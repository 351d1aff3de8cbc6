//! The _client_-side session configuration.

use std::time::Duration;

use hawser_packet::{arch::NameList, trans::KexInit, Id};
use rand::RngCore;

use crate::algorithm::{Cipher, Compress, Hmac, Kex, Key};

/// The strict key-exchange marker we advertise in the initial `KEXINIT`.
///
/// see the OpenSSH `PROTOCOL` document, section 1.10.
pub(crate) const STRICT_CLIENT: &str = "kex-strict-c-v00@openssh.com";

/// The strict key-exchange marker a server advertises in its initial `KEXINIT`.
pub(crate) const STRICT_SERVER: &str = "kex-strict-s-v00@openssh.com";

/// A _client_-side session configuration.
#[derive(Debug, Clone)]
pub struct Client {
    /// [`Id`] for this _client_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// Re-key after this amount of exchanged bytes.
    pub rekey_bytes: usize,

    /// Re-key after this amount of elapsed time.
    pub rekey_after: Duration,

    /// The algorithms enabled for this _client_ session.
    pub algorithms: Algorithms,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(env!("CARGO_PKG_NAME"), "_", env!("CARGO_PKG_VERSION")),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),

            // Re-key after 1GiB of exchanged data or an hour of use,
            // as recommended per the RFC.
            rekey_bytes: 0x40000000,
            rekey_after: Duration::from_secs(3600),

            algorithms: Default::default(),
        }
    }
}

/// Algorithms for a _client_-side session, in preference order.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Vec<Kex>,

    /// Enabled algorithms for _server host key signature_.
    pub keys: Vec<Key>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Vec<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Vec<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Vec<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: vec![
                Kex::Mlkem768X25519Sha256,
                Kex::Curve25519Sha256,
                Kex::Curve25519Sha256Libssh,
                Kex::EcdhSha2NistP256,
                Kex::EcdhSha2NistP384,
                Kex::EcdhSha2NistP521,
                Kex::DiffieHellmanGroupExchangeSha256,
                Kex::DiffieHellmanGroupExchangeSha1,
                Kex::DiffieHellmanGroup16Sha512,
                Kex::DiffieHellmanGroup14Sha256,
                Kex::DiffieHellmanGroup14Sha1,
                Kex::DiffieHellmanGroup1Sha1,
            ],
            keys: vec![
                Key::Ed25519Cert,
                Key::EcdsaNistP256Cert,
                Key::EcdsaNistP384Cert,
                Key::EcdsaNistP521Cert,
                Key::RsaSha512Cert,
                Key::RsaSha256Cert,
                Key::SshRsaCert,
                Key::Ed25519,
                Key::EcdsaNistP256,
                Key::EcdsaNistP384,
                Key::EcdsaNistP521,
                Key::RsaSha512,
                Key::RsaSha256,
                Key::SshRsa,
            ],
            ciphers: vec![
                Cipher::Aes128Ctr,
                Cipher::Aes192Ctr,
                Cipher::Aes256Ctr,
                Cipher::Aes128Gcm,
                Cipher::Aes256Gcm,
                Cipher::ChaCha20Poly1305,
                Cipher::Aes128Cbc,
                Cipher::Aes192Cbc,
                Cipher::Aes256Cbc,
                Cipher::TDesCbc,
            ],
            macs: vec![
                Hmac::HmacSha256,
                Hmac::HmacSha512,
                Hmac::HmacSha1,
                Hmac::HmacSha256ETM,
                Hmac::HmacSha512ETM,
                Hmac::HmacSha1ETM,
            ],
            compressions: vec![Compress::None, Compress::ZlibOpenssh],
        }
    }
}

impl Client {
    /// Generate a `KEXINIT` message from the configuration, advertising
    /// the strict key-exchange extension on the initial exchange only.
    pub(crate) fn kexinit(&self, initial: bool) -> KexInit<'static> {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        let kex_algorithms = self
            .algorithms
            .kexs
            .iter()
            .map(AsRef::as_ref)
            .chain(initial.then_some(STRICT_CLIENT))
            .collect();

        KexInit {
            cookie,
            kex_algorithms,
            server_host_key_algorithms: NameList::from_iter(&self.algorithms.keys),
            encryption_algorithms_client_to_server: NameList::from_iter(&self.algorithms.ciphers),
            encryption_algorithms_server_to_client: NameList::from_iter(&self.algorithms.ciphers),
            mac_algorithms_client_to_server: NameList::from_iter(&self.algorithms.macs),
            mac_algorithms_server_to_client: NameList::from_iter(&self.algorithms.macs),
            compression_algorithms_client_to_server: NameList::from_iter(
                &self.algorithms.compressions,
            ),
            compression_algorithms_server_to_client: NameList::from_iter(
                &self.algorithms.compressions,
            ),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_advertises_strict_kex_initially_only() {
        let config = Client::default();

        assert!(config.kexinit(true).kex_algorithms.contains(STRICT_CLIENT));
        assert!(!config.kexinit(false).kex_algorithms.contains(STRICT_CLIENT));
    }

    #[test]
    fn it_advertises_the_catalogue_in_preference_order() {
        let config = Client::default();
        let kexinit = config.kexinit(false);

        assert_eq!(
            kexinit.kex_algorithms.names().next(),
            Some("mlkem768x25519-sha256")
        );
        assert_eq!(
            kexinit
                .encryption_algorithms_client_to_server
                .names()
                .next(),
            Some("aes128-ctr")
        );
        assert_eq!(
            kexinit.compression_algorithms_client_to_server.as_str(),
            "none,zlib@openssh.com"
        );
    }
}
