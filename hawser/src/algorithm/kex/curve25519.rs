use digest::{Digest, FixedOutputReset};
use hawser_packet::{
    arch::{Bytes, MpInt},
    kex,
    trans::{KexEcdhInit, KexEcdhReply, KexInit},
    Id,
};
use secrecy::{ExposeSecret, SecretBox};

use crate::{session::Hooks, stream::Keys, stream::Stream, Error, Pipe, Result};

use super::Negociated;

pub async fn as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    hooks: &mut impl Hooks,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit<'_>,
    i_s: &KexInit<'_>,
    negociated: &Negociated,
) -> Result<(Keys, Keys)> {
    let e_c = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
    let q_c = x25519_dalek::PublicKey::from(&e_c);

    stream
        .send(&KexEcdhInit {
            q_c: q_c.as_ref().into(),
        })
        .await?;

    let ecdh: KexEcdhReply = stream.recv().await?.to()?;
    let q_s = x25519_dalek::PublicKey::from(
        <[u8; 32]>::try_from(ecdh.q_s.as_ref()).map_err(|_| Error::KexFailed)?,
    );

    let shared = e_c.diffie_hellman(&q_s);
    let secret = SecretBox::new(Box::new(MpInt::positive(shared.as_bytes()).into_vec()));

    let hash = kex::Ecdh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into(),
        i_s: i_s.into(),
        k_s: ecdh.k_s.as_borrow(),
        q_c: q_c.as_ref().into(),
        q_s: ecdh.q_s.as_borrow(),
        k: Bytes::borrowed(secret.expose_secret()).into(),
    }
    .hash::<H>();

    super::conclude::<H>(
        stream,
        hooks,
        negociated,
        ecdh.k_s.as_ref(),
        ecdh.signature.as_ref(),
        &hash,
        secret.expose_secret(),
    )
}
