use hawser_packet::{CipherCore, Mac, OpeningCipher, SealingCipher};
use rand::Rng;
use secrecy::ExposeSecret;

use crate::{
    algorithm::{Cipher, CipherState, Compress, CompressState, Hmac},
    Error, Result,
};

use super::Keys;

impl Mac for Hmac {
    fn size(&self) -> usize {
        self.size()
    }

    fn etm(&self) -> bool {
        self.etm()
    }
}

/// The transport configurations of both directions of a session.
#[derive(Debug, Default)]
pub struct TransportPair {
    pub tx: Transport,
    pub rx: Transport,
}

/// The algorithms, keys and rolling state of one transport direction.
#[derive(Default)]
pub struct Transport {
    pub compress: Compress,
    pub cipher: Cipher,
    pub hmac: Hmac,

    pub state: Option<CipherState>,
    pub compress_state: Option<CompressState>,
    pub compressing: bool,

    pub chain: Keys,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("compress", &self.compress)
            .field("cipher", &self.cipher)
            .field("hmac", &self.hmac)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Turn on a `delayed` compression algorithm after authentication success.
    pub fn activate_compression(&mut self) {
        self.compressing = true;
    }

    /// Carry the rolling compression state over from the previous keying,
    /// the zlib dictionary survives re-keys when the algorithm is unchanged.
    pub fn inherit(&mut self, previous: Transport) {
        if self.compress == previous.compress {
            self.compress_state = previous.compress_state;
        }
        self.compressing = previous.compressing;
    }

    fn padding(&self, payload: usize) -> u8 {
        const MIN_PAD_SIZE: usize = 4;
        const MIN_ALIGN: usize = 8;

        let align = self.block_size().max(MIN_ALIGN);

        let size = if self.clear_length() {
            std::mem::size_of::<u8>() + payload
        } else {
            std::mem::size_of::<u32>() + std::mem::size_of::<u8>() + payload
        };
        let padding = align - size % align;

        let padding = if padding < MIN_PAD_SIZE {
            padding + align
        } else {
            padding
        };

        if size + padding < self.block_size().max(hawser_packet::PACKET_MIN_SIZE) {
            (padding + align) as u8
        } else {
            padding as u8
        }
    }
}

impl CipherCore for Transport {
    type Err = Error;
    type Mac = Hmac;

    fn mac(&self) -> &Hmac {
        &self.hmac
    }

    fn block_size(&self) -> usize {
        self.cipher.block_size().max(8)
    }

    fn aead(&self) -> bool {
        self.cipher.aead()
    }
}

impl OpeningCipher for Transport {
    fn reveal(&mut self, buf: &mut [u8], seq: u32) -> Result<u32> {
        if !self.clear_length() {
            self.cipher.decrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf,
            )?;
        } else if self.cipher == Cipher::ChaCha20Poly1305 {
            // Decrypt a copy of the length, `open` authenticates the
            // packet over the bytes as they travelled.
            let mut length = [0u8; 4];
            length.copy_from_slice(&buf[..4]);

            self.cipher
                .decrypt_length(self.chain.key.expose_secret(), seq, &mut length)?;

            return Ok(u32::from_be_bytes(length));
        }

        Ok(u32::from_be_bytes(
            buf[..4].try_into().expect("read at least 4 bytes"),
        ))
    }

    fn open(&mut self, buf: &mut [u8], tag: Vec<u8>, seq: u32) -> Result<()> {
        if self.aead() {
            self.cipher.open(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf,
                &tag,
                seq,
            )?;
        } else if self.hmac.etm() {
            self.hmac
                .verify(seq, buf, self.chain.hmac.expose_secret(), &tag)?;

            self.cipher.decrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                &mut buf[4..],
            )?;
        } else {
            let first = self.block_size();
            self.cipher.decrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                &mut buf[first..],
            )?;

            if self.hmac.size() > 0 {
                self.hmac
                    .verify(seq, buf, self.chain.hmac.expose_secret(), &tag)?;
            }
        }

        Ok(())
    }

    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>> {
        let active = self.compressing || !self.compress.delayed();
        self.compress
            .decompress(&mut self.compress_state, active, buf)
    }
}

impl SealingCipher for Transport {
    fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>> {
        let active = self.compressing || !self.compress.delayed();
        self.compress.compress(&mut self.compress_state, active, buf)
    }

    fn pad(&mut self, mut buf: Vec<u8>) -> Result<Vec<u8>> {
        let mut rng = rand::thread_rng();

        let padding = self.padding(buf.len());

        // prefix with the size
        let mut padded = vec![padding];
        padded.append(&mut buf);

        // fill with random
        padded.resize_with(padded.len() + padding as usize, || rng.r#gen());

        Ok(padded)
    }

    fn seal(&mut self, buf: &mut [u8], seq: u32) -> Result<Vec<u8>> {
        if self.aead() {
            self.cipher.seal(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf,
                seq,
            )
        } else if self.hmac.etm() {
            self.cipher.encrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                &mut buf[4..],
            )?;

            Ok(self
                .hmac
                .sign(seq, buf, self.chain.hmac.expose_secret()))
        } else {
            let mac = self
                .hmac
                .sign(seq, buf, self.chain.hmac.expose_secret());

            self.cipher.encrypt(
                &mut self.state,
                self.chain.key.expose_secret(),
                self.chain.iv.expose_secret(),
                buf,
            )?;

            Ok(mac)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use hawser_packet::Packet;
    use rstest::rstest;
    use secrecy::SecretBox;

    use super::*;

    fn transport(cipher: Cipher, hmac: Hmac) -> Transport {
        let chain = Keys {
            iv: SecretBox::new(vec![0x05; cipher.iv_size()].into()),
            key: SecretBox::new(vec![0x0b; cipher.key_size()].into()),
            hmac: SecretBox::new(vec![0x0d; hmac.size()].into()),
        };

        Transport {
            cipher,
            hmac,
            chain,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(Cipher::None, Hmac::None)]
    #[case(Cipher::Aes128Ctr, Hmac::HmacSha256)]
    #[case(Cipher::Aes256Ctr, Hmac::HmacSha512)]
    #[case(Cipher::Aes128Cbc, Hmac::HmacSha1)]
    #[case(Cipher::TDesCbc, Hmac::HmacSha256)]
    #[case(Cipher::Aes128Ctr, Hmac::HmacSha256ETM)]
    #[case(Cipher::Aes256Cbc, Hmac::HmacSha512ETM)]
    #[case(Cipher::Aes128Gcm, Hmac::None)]
    #[case(Cipher::Aes256Gcm, Hmac::None)]
    #[case(Cipher::ChaCha20Poly1305, Hmac::None)]
    #[async_std::test]
    async fn it_roundtrips_packets(#[case] cipher: Cipher, #[case] hmac: Hmac) {
        let mut tx = transport(cipher.clone(), hmac.clone());
        let mut rx = transport(cipher, hmac);

        for seq in 0..4u32 {
            let packet = Packet {
                payload: vec![0x14; 23 + seq as usize],
            };

            let mut wire = Vec::new();
            packet
                .to_writer(&mut futures::io::Cursor::new(&mut wire), &mut tx, seq)
                .await
                .unwrap();

            let read =
                Packet::from_reader(&mut futures::io::Cursor::new(&wire), &mut rx, seq)
                    .await
                    .unwrap();

            assert_eq!(read.payload, packet.payload);
        }
    }

    // AES-GCM is keyed by its own invocation counter rather than the
    // sequence number, hence its absence here.
    #[rstest]
    #[case(Cipher::Aes128Ctr, Hmac::HmacSha256)]
    #[case(Cipher::Aes128Ctr, Hmac::HmacSha256ETM)]
    #[case(Cipher::ChaCha20Poly1305, Hmac::None)]
    #[async_std::test]
    async fn it_rejects_wrong_sequence_numbers(#[case] cipher: Cipher, #[case] hmac: Hmac) {
        let mut tx = transport(cipher.clone(), hmac.clone());
        let mut rx = transport(cipher, hmac);

        let packet = Packet {
            payload: vec![0x14; 16],
        };

        let mut wire = Vec::new();
        packet
            .to_writer(&mut futures::io::Cursor::new(&mut wire), &mut tx, 0)
            .await
            .unwrap();

        Packet::from_reader(&mut futures::io::Cursor::new(&wire), &mut rx, 1)
            .await
            .unwrap_err();
    }
}
