use digest::{Digest, FixedOutputReset};
use hawser_packet::{arch::NameList, trans::KexInit, Id};
use strum::{AsRefStr, EnumString};

use crate::{
    session::Hooks,
    stream::{Keys, Stream, Transport, TransportPair},
    Error, Pipe, Result,
};

use super::{Cipher, Compress, Hmac, Key, Negociate, Rx, Tx};

mod curve25519;
mod dh;
mod ecdh;
mod hybrid;

impl Negociate for Kex {
    const ERR: Error = Error::NoCommonKex;

    fn field<'f>(kex: &'f KexInit) -> &'f NameList<'f> {
        &kex.kex_algorithms
    }
}

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Kex {
    /// Hybrid post-quantum ML-KEM-768 with Curve25519 ECDH, sha-2-256 digest.
    #[strum(serialize = "mlkem768x25519-sha256")]
    Mlkem768X25519Sha256,

    /// Curve25519 ECDH with sha-2-256 digest.
    Curve25519Sha256,

    /// Curve25519 ECDH with sha-2-256 digest (pre-RFC 8731).
    #[strum(serialize = "curve25519-sha256@libssh.org")]
    Curve25519Sha256Libssh,

    /// NIST P-256 ECDH with sha-2-256 digest.
    #[strum(serialize = "ecdh-sha2-nistp256")]
    EcdhSha2NistP256,

    /// NIST P-384 ECDH with sha-2-384 digest.
    #[strum(serialize = "ecdh-sha2-nistp384")]
    EcdhSha2NistP384,

    /// NIST P-521 ECDH with sha-2-512 digest.
    #[strum(serialize = "ecdh-sha2-nistp521")]
    EcdhSha2NistP521,

    /// Diffie-Hellman group negociation with sha-2-256 digest.
    DiffieHellmanGroupExchangeSha256,

    /// Diffie-Hellman group negociation with sha-1 digest.
    DiffieHellmanGroupExchangeSha1,

    /// Diffie-Hellman over the 4096-bit MODP group with sha-2-512 digest.
    DiffieHellmanGroup16Sha512,

    /// Diffie-Hellman over the 2048-bit MODP group with sha-2-256 digest.
    DiffieHellmanGroup14Sha256,

    /// Diffie-Hellman over the 2048-bit MODP group with sha-1 digest.
    DiffieHellmanGroup14Sha1,

    /// Diffie-Hellman over the legacy 1024-bit MODP group with sha-1 digest.
    DiffieHellmanGroup1Sha1,
}

impl Kex {
    pub(crate) async fn as_client(
        &self,
        stream: &mut Stream<impl Pipe>,
        hooks: &mut impl Hooks,
        v_c: &Id,
        v_s: &Id,
        i_c: &KexInit<'_>,
        i_s: &KexInit<'_>,
    ) -> Result<TransportPair> {
        let key = <Key as Negociate>::negociate(i_c, i_s)?;

        let (client_hmac, server_hmac) = (
            <Hmac as Negociate<Tx>>::negociate(i_c, i_s)?,
            <Hmac as Negociate<Rx>>::negociate(i_c, i_s)?,
        );
        let (client_compress, server_compress) = (
            <Compress as Negociate<Tx>>::negociate(i_c, i_s)?,
            <Compress as Negociate<Rx>>::negociate(i_c, i_s)?,
        );
        let (client_cipher, server_cipher) = (
            <Cipher as Negociate<Tx>>::negociate(i_c, i_s)?,
            <Cipher as Negociate<Rx>>::negociate(i_c, i_s)?,
        );

        // AEAD ciphers authenticate on their own and void the MAC slot.
        let client_hmac = if client_cipher.aead() {
            Hmac::None
        } else {
            client_hmac
        };
        let server_hmac = if server_cipher.aead() {
            Hmac::None
        } else {
            server_hmac
        };

        let negociated = Negociated {
            key,
            client_cipher,
            server_cipher,
            client_hmac,
            server_hmac,
        };

        let (client_keys, server_keys) = match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                curve25519::as_client::<sha2::Sha256>(stream, hooks, v_c, v_s, i_c, i_s, &negociated)
                    .await?
            }
            Self::Mlkem768X25519Sha256 => {
                hybrid::as_client::<sha2::Sha256>(stream, hooks, v_c, v_s, i_c, i_s, &negociated)
                    .await?
            }
            Self::EcdhSha2NistP256 => {
                ecdh::as_client::<sha2::Sha256, p256::NistP256>(
                    stream, hooks, v_c, v_s, i_c, i_s, &negociated,
                )
                .await?
            }
            Self::EcdhSha2NistP384 => {
                ecdh::as_client::<sha2::Sha384, p384::NistP384>(
                    stream, hooks, v_c, v_s, i_c, i_s, &negociated,
                )
                .await?
            }
            Self::EcdhSha2NistP521 => {
                ecdh::as_client::<sha2::Sha512, p521::NistP521>(
                    stream, hooks, v_c, v_s, i_c, i_s, &negociated,
                )
                .await?
            }
            Self::DiffieHellmanGroupExchangeSha256 => {
                dh::gex_as_client::<sha2::Sha256>(stream, hooks, v_c, v_s, i_c, i_s, &negociated)
                    .await?
            }
            Self::DiffieHellmanGroupExchangeSha1 => {
                dh::gex_as_client::<sha1::Sha1>(stream, hooks, v_c, v_s, i_c, i_s, &negociated)
                    .await?
            }
            Self::DiffieHellmanGroup16Sha512 => {
                dh::as_client::<sha2::Sha512>(
                    stream,
                    hooks,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negociated,
                    dh::Group::Modp4096,
                )
                .await?
            }
            Self::DiffieHellmanGroup14Sha256 => {
                dh::as_client::<sha2::Sha256>(
                    stream,
                    hooks,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negociated,
                    dh::Group::Modp2048,
                )
                .await?
            }
            Self::DiffieHellmanGroup14Sha1 => {
                dh::as_client::<sha1::Sha1>(
                    stream,
                    hooks,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negociated,
                    dh::Group::Modp2048,
                )
                .await?
            }
            Self::DiffieHellmanGroup1Sha1 => {
                dh::as_client::<sha1::Sha1>(
                    stream,
                    hooks,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negociated,
                    dh::Group::Modp1024,
                )
                .await?
            }
        };

        let Negociated {
            client_cipher,
            server_cipher,
            client_hmac,
            server_hmac,
            ..
        } = negociated;

        Ok(TransportPair {
            rx: Transport {
                chain: server_keys,
                state: None,
                compress_state: None,
                compressing: false,
                cipher: server_cipher,
                hmac: server_hmac,
                compress: server_compress,
            },
            tx: Transport {
                chain: client_keys,
                state: None,
                compress_state: None,
                compressing: false,
                cipher: client_cipher,
                hmac: client_hmac,
                compress: client_compress,
            },
        })
    }
}

/// The outcome of the per-slot algorithm negociation, threaded
/// through the key-exchange methods for key sizing and host-key
/// verification.
pub(super) struct Negociated {
    pub key: Key,
    pub client_cipher: Cipher,
    pub server_cipher: Cipher,
    pub client_hmac: Hmac,
    pub server_hmac: Hmac,
}

/// The common tail of every key-exchange method: verify the server's
/// signature over the exchange hash, let the application veto the host
/// key, then derive the keying material of both directions.
fn conclude<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    hooks: &mut impl Hooks,
    negociated: &Negociated,
    k_s: &[u8],
    signature: &[u8],
    hash: &[u8],
    secret: &impl AsRef<[u8]>,
) -> Result<(Keys, Keys)> {
    let host_key = negociated.key.verify(k_s, hash, signature)?;

    if !hooks.on_host_key(&host_key) {
        return Err(Error::HostKeyRejected);
    }

    let session_id = stream.with_session(hash);

    Ok((
        Keys::as_client::<H>(
            secret,
            hash,
            session_id,
            &negociated.client_cipher,
            &negociated.client_hmac,
        ),
        Keys::as_server::<H>(
            secret,
            hash,
            session_id,
            &negociated.server_cipher,
            &negociated.server_hmac,
        ),
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Kex::Mlkem768X25519Sha256, "mlkem768x25519-sha256")]
    #[case(Kex::Curve25519Sha256, "curve25519-sha256")]
    #[case(Kex::Curve25519Sha256Libssh, "curve25519-sha256@libssh.org")]
    #[case(Kex::EcdhSha2NistP521, "ecdh-sha2-nistp521")]
    #[case(
        Kex::DiffieHellmanGroupExchangeSha256,
        "diffie-hellman-group-exchange-sha256"
    )]
    #[case(Kex::DiffieHellmanGroup16Sha512, "diffie-hellman-group16-sha512")]
    #[case(Kex::DiffieHellmanGroup1Sha1, "diffie-hellman-group1-sha1")]
    fn it_names_kexes(#[case] kex: Kex, #[case] name: &str) {
        assert_eq!(kex.as_ref(), name);
        assert_eq!(name.parse::<Kex>().unwrap(), kex);
    }
}
