use digest::{Digest, FixedOutputReset};
use secrecy::SecretBox;

use crate::algorithm::{Cipher, Hmac};

/// The keying material of one transport direction, derived from the
/// exchange secret and hash per
/// [RFC4253 section 7.2](https://datatracker.ietf.org/doc/html/rfc4253#section-7.2).
#[derive(Default)]
pub struct Keys {
    /// Cipher _initialization vector_.
    pub iv: SecretBox<Vec<u8>>,

    /// Cipher _key_.
    pub key: SecretBox<Vec<u8>>,

    /// Hmac _key_.
    pub hmac: SecretBox<Vec<u8>>,
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys").finish_non_exhaustive()
    }
}

impl Keys {
    /// Derive the keys of the _client to server_ direction.
    pub fn as_client<D: Digest + FixedOutputReset>(
        secret: &impl AsRef<[u8]>,
        hash: &[u8],
        session_id: &[u8],
        cipher: &Cipher,
        hmac: &Hmac,
    ) -> Self {
        Self {
            iv: Self::derive::<D>(secret, hash, b'A', session_id, cipher.iv_size()),
            key: Self::derive::<D>(secret, hash, b'C', session_id, cipher.key_size()),
            hmac: Self::derive::<D>(secret, hash, b'E', session_id, hmac.size()),
        }
    }

    /// Derive the keys of the _server to client_ direction.
    pub fn as_server<D: Digest + FixedOutputReset>(
        secret: &impl AsRef<[u8]>,
        hash: &[u8],
        session_id: &[u8],
        cipher: &Cipher,
        hmac: &Hmac,
    ) -> Self {
        Self {
            iv: Self::derive::<D>(secret, hash, b'B', session_id, cipher.iv_size()),
            key: Self::derive::<D>(secret, hash, b'D', session_id, cipher.key_size()),
            hmac: Self::derive::<D>(secret, hash, b'F', session_id, hmac.size()),
        }
    }

    fn derive<D: Digest + FixedOutputReset>(
        secret: &impl AsRef<[u8]>,
        hash: &[u8],
        kind: u8,
        session_id: &[u8],
        size: usize,
    ) -> SecretBox<Vec<u8>> {
        SecretBox::init_with_mut(|key: &mut Vec<u8>| {
            let mut hasher = D::new()
                .chain_update((secret.as_ref().len() as u32).to_be_bytes())
                .chain_update(secret)
                .chain_update(hash)
                .chain_update([kind])
                .chain_update(session_id);

            key.extend_from_slice(&hasher.finalize_reset());

            while key.len() < size {
                hasher = hasher
                    .chain_update((secret.as_ref().len() as u32).to_be_bytes())
                    .chain_update(secret)
                    .chain_update(hash)
                    .chain_update(&*key);

                key.extend_from_slice(&hasher.finalize_reset());
            }

            key.truncate(size);
        })
    }
}
