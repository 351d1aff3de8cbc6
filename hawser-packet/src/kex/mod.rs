//! Facilities to produce the _exchange hashes_ of the key-exchange methods.

use binrw::{binwrite, BinWrite};

use super::{arch, trans};

mod lengthed;
pub use lengthed::Lengthed;

fn digest<D, T>(value: &T) -> digest::Output<D>
where
    D: digest::Digest,
    T: for<'a> BinWrite<Args<'a> = ()> + binrw::meta::WriteEndian,
{
    let mut buffer = Vec::new();
    value
        .write(&mut std::io::Cursor::new(&mut buffer))
        .expect("The binrw structure serialization failed");

    D::digest(&buffer)
}

/// The exchange hash for ECDH-flavored methods, computed as the
/// hash of the concatenation of the following.
///
/// see <https://datatracker.ietf.org/doc/html/rfc5656#section-4>.
#[binwrite]
#[derive(Debug)]
#[bw(big)]
pub struct Ecdh<'b> {
    /// Client's identification string (`\r` and `\n` excluded).
    pub v_c: arch::Bytes<'b>,

    /// Server's identification string (`\r` and `\n` excluded).
    pub v_s: arch::Bytes<'b>,

    /// Payload of the client's `SSH_MSG_KEXINIT` message.
    pub i_c: Lengthed<&'b trans::KexInit<'b>>,

    /// Payload of the server's `SSH_MSG_KEXINIT` message.
    pub i_s: Lengthed<&'b trans::KexInit<'b>>,

    /// Server's public host key.
    pub k_s: arch::Bytes<'b>,

    /// Client's ephemeral public key octet string.
    pub q_c: arch::Bytes<'b>,

    /// Server's ephemeral public key octet string.
    pub q_s: arch::Bytes<'b>,

    /// Computed shared secret.
    pub k: arch::MpInt<'b>,
}

impl Ecdh<'_> {
    /// Produce the exchange hash with the specified digest algorithm.
    pub fn hash<D: digest::Digest>(&self) -> digest::Output<D> {
        digest::<D, _>(self)
    }
}

/// The exchange hash for the post-quantum hybrid methods; identical to
/// [`Ecdh`] except the shared secret is already a hash output and is
/// encoded as a plain `string` rather than a `mpint`.
///
/// see <https://datatracker.ietf.org/doc/draft-kampanakis-curdle-ssh-pq-ke/>.
#[binwrite]
#[derive(Debug)]
#[bw(big)]
pub struct Hybrid<'b> {
    /// Client's identification string (`\r` and `\n` excluded).
    pub v_c: arch::Bytes<'b>,

    /// Server's identification string (`\r` and `\n` excluded).
    pub v_s: arch::Bytes<'b>,

    /// Payload of the client's `SSH_MSG_KEXINIT` message.
    pub i_c: Lengthed<&'b trans::KexInit<'b>>,

    /// Payload of the server's `SSH_MSG_KEXINIT` message.
    pub i_s: Lengthed<&'b trans::KexInit<'b>>,

    /// Server's public host key.
    pub k_s: arch::Bytes<'b>,

    /// Client's concatenated encapsulation and public keys.
    pub c_init: arch::Bytes<'b>,

    /// Server's concatenated ciphertext and public key.
    pub s_reply: arch::Bytes<'b>,

    /// Hash of the concatenated KEM and ECDH shared secrets.
    pub k: arch::Bytes<'b>,
}

impl Hybrid<'_> {
    /// Produce the exchange hash with the specified digest algorithm.
    pub fn hash<D: digest::Digest>(&self) -> digest::Output<D> {
        digest::<D, _>(self)
    }
}

/// The exchange hash for the fixed-group Diffie-Hellman methods.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-8>.
#[binwrite]
#[derive(Debug)]
#[bw(big)]
pub struct Dh<'b> {
    /// Client's identification string (`\r` and `\n` excluded).
    pub v_c: arch::Bytes<'b>,

    /// Server's identification string (`\r` and `\n` excluded).
    pub v_s: arch::Bytes<'b>,

    /// Payload of the client's `SSH_MSG_KEXINIT` message.
    pub i_c: Lengthed<&'b trans::KexInit<'b>>,

    /// Payload of the server's `SSH_MSG_KEXINIT` message.
    pub i_s: Lengthed<&'b trans::KexInit<'b>>,

    /// Server's public host key.
    pub k_s: arch::Bytes<'b>,

    /// Client's exchange value.
    pub e: arch::MpInt<'b>,

    /// Server's exchange value.
    pub f: arch::MpInt<'b>,

    /// Computed shared secret.
    pub k: arch::MpInt<'b>,
}

impl Dh<'_> {
    /// Produce the exchange hash with the specified digest algorithm.
    pub fn hash<D: digest::Digest>(&self) -> digest::Output<D> {
        digest::<D, _>(self)
    }
}

/// The exchange hash for the Diffie-Hellman group-exchange methods.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4419#section-3>.
#[binwrite]
#[derive(Debug)]
#[bw(big)]
pub struct DhGex<'b> {
    /// Client's identification string (`\r` and `\n` excluded).
    pub v_c: arch::Bytes<'b>,

    /// Server's identification string (`\r` and `\n` excluded).
    pub v_s: arch::Bytes<'b>,

    /// Payload of the client's `SSH_MSG_KEXINIT` message.
    pub i_c: Lengthed<&'b trans::KexInit<'b>>,

    /// Payload of the server's `SSH_MSG_KEXINIT` message.
    pub i_s: Lengthed<&'b trans::KexInit<'b>>,

    /// Server's public host key.
    pub k_s: arch::Bytes<'b>,

    /// Minimal acceptable modulus size, in bits.
    pub min: u32,

    /// Preferred modulus size, in bits.
    pub n: u32,

    /// Maximal acceptable modulus size, in bits.
    pub max: u32,

    /// The group's safe prime.
    pub p: arch::MpInt<'b>,

    /// The group's generator.
    pub g: arch::MpInt<'b>,

    /// Client's exchange value.
    pub e: arch::MpInt<'b>,

    /// Server's exchange value.
    pub f: arch::MpInt<'b>,

    /// Computed shared secret.
    pub k: arch::MpInt<'b>,
}

impl DhGex<'_> {
    /// Produce the exchange hash with the specified digest algorithm.
    pub fn hash<D: digest::Digest>(&self) -> digest::Output<D> {
        digest::<D, _>(self)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn kexinit() -> trans::KexInit<'static> {
        trans::KexInit {
            cookie: [0; 16],
            kex_algorithms: Default::default(),
            server_host_key_algorithms: Default::default(),
            encryption_algorithms_client_to_server: Default::default(),
            encryption_algorithms_server_to_client: Default::default(),
            mac_algorithms_client_to_server: Default::default(),
            mac_algorithms_server_to_client: Default::default(),
            compression_algorithms_client_to_server: Default::default(),
            compression_algorithms_server_to_client: Default::default(),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false.into(),
        }
    }

    #[test]
    fn it_hashes_deterministically() {
        let (i_c, i_s) = (kexinit(), kexinit());

        let hash = |k: &[u8]| {
            Ecdh {
                v_c: b"SSH-2.0-client".into(),
                v_s: b"SSH-2.0-server".into(),
                i_c: (&i_c).into(),
                i_s: (&i_s).into(),
                k_s: b"hostkey".into(),
                q_c: b"qc".into(),
                q_s: b"qs".into(),
                k: arch::MpInt::positive(k),
            }
            .hash::<sha2::Sha256>()
        };

        assert_eq!(hash(&[0x42]), hash(&[0x42]));
        assert_ne!(hash(&[0x42]), hash(&[0x43]));
    }
}
