use digest::{Digest, FixedOutputReset};
use hawser_packet::{
    arch::{Bytes, MpInt},
    kex,
    trans::{
        KexDhGexGroup, KexDhGexInit, KexDhGexReply, KexDhGexRequest, KexDhInit, KexDhReply,
        KexInit,
    },
    Id,
};
use num_bigint_dig::{BigUint, RandBigInt};
use secrecy::{ExposeSecret, SecretBox};

use crate::{session::Hooks, stream::Keys, stream::Stream, Error, Pipe, Result};

use super::Negociated;

/// Group-exchange modulus size bounds, in bits.
const GEX_MIN: u32 = 1024;
const GEX_PREFERRED: u32 = 2048;
const GEX_MAX: u32 = 8192;

/// The fixed MODP groups of
/// [RFC2409](https://datatracker.ietf.org/doc/html/rfc2409#section-6.2) and
/// [RFC3526](https://datatracker.ietf.org/doc/html/rfc3526).
#[derive(Debug, Clone, Copy)]
pub enum Group {
    /// The 1024-bit Oakley Group 2.
    Modp1024,

    /// The 2048-bit MODP group 14.
    Modp2048,

    /// The 4096-bit MODP group 16.
    Modp4096,
}

const MODP1024: &str = "\
    FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
    020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
    4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
    EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381FFFFFFFFFFFFFFFF";

const MODP2048: &str = "\
    FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
    020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
    4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
    EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
    98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
    9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
    E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
    3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

const MODP4096: &str = "\
    FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
    020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
    4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
    EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
    98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
    9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
    E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
    3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D04507A33\
    A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F85A6E1E4C7\
    ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA06D98A0864\
    D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988C0BAD946E2\
    08E24FA074E5AB3143DB5BFCE0FD108E4B82D120A92108011A723C12A787E6D7\
    88719A10BDBA5B2699C327186AF4E23C1A946834B6150BDA2583E9CA2AD44CE8\
    DBBBC2DB04DE8EF92E8EFC141FBECAA6287C59474E6BC05D99B2964FA090C3A2\
    233BA186515BE7ED1F612970CEE2D7AFB81BDD762170481CD0069127D5B05AA9\
    93B4EA988D8FDDC186FFB7DC90A6C08F4DF435C934063199FFFFFFFFFFFFFFFF";

impl Group {
    fn modulus(&self) -> BigUint {
        let hex = match self {
            Self::Modp1024 => MODP1024,
            Self::Modp2048 => MODP2048,
            Self::Modp4096 => MODP4096,
        };

        BigUint::parse_bytes(hex.as_bytes(), 16).expect("the MODP group constants are valid hex")
    }
}

/// One classic Diffie-Hellman round over the group `(p, g)`: draw the
/// ephemeral exponent, emit `e` through `init`, and compute the shared
/// secret from the peer's `f` after validating `1 < f < p - 1`.
struct Exchange {
    x: BigUint,
    p: BigUint,
    pub e: BigUint,
}

impl Exchange {
    fn new(p: BigUint, g: &BigUint) -> Self {
        let x = rand::thread_rng()
            .gen_biguint_range(&BigUint::from(2u32), &(&p >> 1usize));
        let e = g.modpow(&x, &p);

        Self { x, p, e }
    }

    fn secret(self, f: &MpInt<'_>) -> Result<SecretBox<Vec<u8>>> {
        let f = BigUint::from_bytes_be(f.as_ref());

        if f <= BigUint::from(1u32) || f >= &self.p - 1u32 {
            return Err(Error::KexFailed);
        }

        let k = f.modpow(&self.x, &self.p);

        Ok(SecretBox::new(Box::new(
            MpInt::positive(&k.to_bytes_be()).into_vec(),
        )))
    }
}

pub async fn as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    hooks: &mut impl Hooks,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit<'_>,
    i_s: &KexInit<'_>,
    negociated: &Negociated,
    group: Group,
) -> Result<(Keys, Keys)> {
    let exchange = Exchange::new(group.modulus(), &BigUint::from(2u32));
    let e = MpInt::positive(&exchange.e.to_bytes_be());

    stream.send(&KexDhInit { e: e.as_borrow() }).await?;

    let reply: KexDhReply = stream.recv().await?.to()?;
    let secret = exchange.secret(&reply.f)?;

    let hash = kex::Dh {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into(),
        i_s: i_s.into(),
        k_s: reply.k_s.as_borrow(),
        e: e.as_borrow(),
        f: reply.f.as_borrow(),
        k: Bytes::borrowed(secret.expose_secret()).into(),
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

pub async fn gex_as_client<H: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Pipe>,
    hooks: &mut impl Hooks,
    v_c: &Id,
    v_s: &Id,
    i_c: &KexInit<'_>,
    i_s: &KexInit<'_>,
    negociated: &Negociated,
) -> Result<(Keys, Keys)> {
    stream
        .send(&KexDhGexRequest {
            min: GEX_MIN,
            n: GEX_PREFERRED,
            max: GEX_MAX,
        })
        .await?;

    let group: KexDhGexGroup = stream.recv().await?.to()?;

    let p = BigUint::from_bytes_be(group.p.as_ref());
    let g = BigUint::from_bytes_be(group.g.as_ref());

    if p.bits() < GEX_MIN as usize || p.bits() > GEX_MAX as usize || g < BigUint::from(2u32) {
        return Err(Error::KexFailed);
    }

    let exchange = Exchange::new(p, &g);
    let e = MpInt::positive(&exchange.e.to_bytes_be());

    stream.send(&KexDhGexInit { e: e.as_borrow() }).await?;

    let reply: KexDhGexReply = stream.recv().await?.to()?;
    let secret = exchange.secret(&reply.f)?;

    let hash = kex::DhGex {
        v_c: v_c.to_string().into_bytes().into(),
        v_s: v_s.to_string().into_bytes().into(),
        i_c: i_c.into(),
        i_s: i_s.into(),
        k_s: reply.k_s.as_borrow(),
        min: GEX_MIN,
        n: GEX_PREFERRED,
        max: GEX_MAX,
        p: group.p.as_borrow(),
        g: group.g.as_borrow(),
        e: e.as_borrow(),
        f: reply.f.as_borrow(),
        k: Bytes::borrowed(secret.expose_secret()).into(),
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

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Group::Modp1024, 1024)]
    #[case(Group::Modp2048, 2048)]
    #[case(Group::Modp4096, 4096)]
    fn it_loads_the_modp_groups(#[case] group: Group, #[case] bits: usize) {
        assert_eq!(group.modulus().bits(), bits);
    }

    #[test]
    fn it_agrees_on_the_shared_secret() {
        let p = Group::Modp2048.modulus();
        let g = BigUint::from(2u32);

        let ours = Exchange::new(p.clone(), &g);
        let theirs = Exchange::new(p, &g);

        let e = MpInt::positive(&ours.e.to_bytes_be());
        let f = MpInt::positive(&theirs.e.to_bytes_be());

        let k_client = ours.secret(&f).unwrap();
        let k_server = theirs.secret(&e).unwrap();

        assert_eq!(
            k_client.expose_secret(),
            k_server.expose_secret()
        );
    }

    #[test]
    fn it_rejects_degenerate_public_values() {
        let exchange = Exchange::new(Group::Modp2048.modulus(), &BigUint::from(2u32));

        exchange.secret(&MpInt::positive(&[0x01])).unwrap_err();
    }
}
