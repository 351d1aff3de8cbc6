use digest::{Digest, FixedOutputReset};
use hawser_packet::{
    arch::Bytes,
    kex,
    trans::{KexEcdhInit, KexEcdhReply, KexInit},
    Id,
};
use ml_kem::{kem::Decapsulate, EncodedSizeUser, KemCore, MlKem768};
use secrecy::{ExposeSecret, SecretBox};

use crate::{session::Hooks, stream::Keys, stream::Stream, Error, Pipe, Result};

use super::Negociated;

/// Size of the ML-KEM-768 encapsulation key sent by the client.
const EK_SIZE: usize = 1184;

/// Size of the ML-KEM-768 ciphertext returned by the server.
const CT_SIZE: usize = 1088;

/// The post-quantum hybrid exchange of
/// [draft-kampanakis-curdle-ssh-pq-ke](https://datatracker.ietf.org/doc/draft-kampanakis-curdle-ssh-pq-ke/):
/// the client concatenates its ML-KEM-768 encapsulation key with an
/// X25519 public key, the server answers with the KEM ciphertext and
/// its own X25519 public key, and the shared secret is the hash of
/// both shared secrets, used as a plain `string` rather than a `mpint`.
pub async fn as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    hooks: &mut impl Hooks,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit<'_>,
    i_s: &KexInit<'_>,
    negociated: &Negociated,
) -> Result<(Keys, Keys)> {
    let (dk, ek, e_c) = {
        let mut rng = rand::thread_rng();

        let (dk, ek) = MlKem768::generate(&mut rng);
        let e_c = x25519_dalek::EphemeralSecret::random_from_rng(&mut rng);

        (dk, ek, e_c)
    };
    let q_c = x25519_dalek::PublicKey::from(&e_c);

    let c_init = [&ek.as_bytes()[..], q_c.as_ref()].concat();

    stream
        .send(&KexEcdhInit {
            q_c: c_init.as_slice().into(),
        })
        .await?;

    let reply: KexEcdhReply = stream.recv().await?.to()?;
    let s_reply = reply.q_s.as_ref();

    if s_reply.len() != CT_SIZE + 32 {
        return Err(Error::KexFailed);
    }

    let ct = ml_kem::Ciphertext::<MlKem768>::try_from(&s_reply[..CT_SIZE])
        .map_err(|_| Error::KexFailed)?;
    let kem_shared = dk.decapsulate(&ct).map_err(|_| Error::KexFailed)?;

    let q_s = x25519_dalek::PublicKey::from(
        <[u8; 32]>::try_from(&s_reply[CT_SIZE..]).map_err(|_| Error::KexFailed)?,
    );
    let ecdh_shared = e_c.diffie_hellman(&q_s);

    // K is itself a digest over both shared secrets.
    let secret = SecretBox::new(Box::new(
        H::digest([&kem_shared[..], ecdh_shared.as_bytes()].concat()).to_vec(),
    ));

    let hash = kex::Hybrid {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into(),
        i_s: i_s.into(),
        k_s: reply.k_s.as_borrow(),
        c_init: c_init.as_slice().into(),
        s_reply: reply.q_s.as_borrow(),
        k: Bytes::borrowed(secret.expose_secret()),
    }
    .hash::<H>();

    super::conclude::<H>(
        stream,
        hooks,
        negociated,
        reply.k_s.as_ref(),
        reply.signature.as_ref(),
        &hash,
        secret.expose_secret(),
    )
}
