use digest::{Digest, FixedOutputReset};
use elliptic_curve::{
    ecdh::EphemeralSecret,
    sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint},
    CurveArithmetic, PublicKey,
};
use hawser_packet::{
    arch::{Bytes, MpInt},
    kex,
    trans::{KexEcdhInit, KexEcdhReply, KexInit},
    Id,
};
use secrecy::{ExposeSecret, SecretBox};

use crate::{session::Hooks, stream::Keys, stream::Stream, Error, Pipe, Result};

use super::Negociated;

/// The NIST prime-curve flavor of the ECDH exchange of
/// [RFC5656](https://datatracker.ietf.org/doc/html/rfc5656#section-4),
/// with uncompressed SEC1 points on the wire.
pub async fn as_client<H, C>(
    stream: &mut Stream<impl Pipe>,
    hooks: &mut impl Hooks,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit<'_>,
    i_s: &KexInit<'_>,
    negociated: &Negociated,
) -> Result<(Keys, Keys)>
where
    H: Digest + FixedOutputReset,
    C: CurveArithmetic,
    C::AffinePoint: FromEncodedPoint<C> + ToEncodedPoint<C>,
    C::FieldBytesSize: ModulusSize,
{
    let e_c = EphemeralSecret::<C>::random(&mut rand::thread_rng());
    let q_c = e_c.public_key().to_encoded_point(false);

    stream
        .send(&KexEcdhInit {
            q_c: q_c.as_bytes().into(),
        })
        .await?;

    let ecdh: KexEcdhReply = stream.recv().await?.to()?;
    let q_s = PublicKey::<C>::from_sec1_bytes(ecdh.q_s.as_ref()).map_err(|_| Error::KexFailed)?;

    // The shared secret is the x-coordinate, leading zeroes stripped.
    let shared = e_c.diffie_hellman(&q_s);
    let secret = SecretBox::new(Box::new(
        MpInt::positive(shared.raw_secret_bytes()).into_vec(),
    ));

    let hash = kex::Ecdh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into(),
        i_s: i_s.into(),
        k_s: ecdh.k_s.as_borrow(),
        q_c: q_c.as_bytes().into(),
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
