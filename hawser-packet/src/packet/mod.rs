use binrw::{
    meta::{ReadEndian, WriteEndian},
    BinRead, BinWrite,
};

mod cipher;
pub use cipher::{CipherCore, OpeningCipher, SealingCipher};

mod mac;
pub use mac::Mac;

use crate::{Error, PACKET_MAX_SIZE, PACKET_MIN_SIZE};

/// A packet _deserialization_ & _serialization_ helper.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-6>.
#[derive(Debug, Clone)]
pub struct Packet {
    /// The decrypted, decompressed payload of the packet.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Try to deserialize the [`Packet`] into `T`.
    pub fn to<T: for<'a> BinRead<Args<'a> = ()> + ReadEndian>(&self) -> Result<T, binrw::Error> {
        T::read(&mut std::io::Cursor::new(&self.payload))
    }

    /// Read a [`Packet`] from the provided asynchronous `reader`.
    pub async fn from_reader<R, C>(reader: &mut R, cipher: &mut C, seq: u32) -> Result<Self, C::Err>
    where
        R: futures::io::AsyncRead + Unpin,
        C: OpeningCipher,
    {
        use futures::io::AsyncReadExt;

        let initial = if cipher.clear_length() {
            std::mem::size_of::<u32>()
        } else {
            cipher.block_size()
        };

        let mut buf = vec![0; initial];
        reader.read_exact(&mut buf[..]).await?;

        let len = cipher.reveal(&mut buf[..], seq)?;

        if (len as usize) < Self::MIN_LENGTH
            || len as usize > PACKET_MAX_SIZE - std::mem::size_of::<u32>()
        {
            return Err(Error::MalformedPacket("packet length out of bounds").into());
        }
        if !cipher.clear_length()
            && (len as usize + std::mem::size_of::<u32>()) % cipher.block_size() != 0
        {
            return Err(Error::MalformedPacket("packet length breaks block alignment").into());
        }

        buf.resize(std::mem::size_of::<u32>() + len as usize, 0);
        reader.read_exact(&mut buf[initial..]).await?;

        let mut tag = vec![0; cipher.tag_size()];
        reader.read_exact(&mut tag[..]).await?;

        cipher.open(&mut buf[..], tag, seq)?;

        let (padlen, decrypted) = buf[std::mem::size_of::<u32>()..]
            .split_first()
            .ok_or(Error::MalformedPacket("packet too short for its padding"))?;

        if (*padlen as usize) < Self::MIN_PADDING || *padlen as usize >= len as usize {
            return Err(Error::MalformedPacket("padding length out of bounds").into());
        }

        let payload = decrypted[..len as usize - *padlen as usize - 1].to_vec();
        let payload = cipher.decompress(payload)?;

        Ok(Self { payload })
    }

    /// Write the [`Packet`] to the provided asynchronous `writer`.
    pub async fn to_writer<W, C>(
        &self,
        writer: &mut W,
        cipher: &mut C,
        seq: u32,
    ) -> Result<(), C::Err>
    where
        W: futures::io::AsyncWrite + Unpin,
        C: SealingCipher,
    {
        use futures::io::AsyncWriteExt;

        let compressed = cipher.compress(&self.payload)?;
        let padded = cipher.pad(compressed)?;

        let mut buf = Vec::with_capacity(std::mem::size_of::<u32>() + padded.len());
        buf.extend_from_slice(&(padded.len() as u32).to_be_bytes());
        buf.extend_from_slice(&padded);

        if buf.len() + cipher.tag_size() > PACKET_MAX_SIZE {
            return Err(Error::MalformedPacket("packet exceeds the maximum size").into());
        }

        let tag = cipher.seal(&mut buf[..], seq)?;

        writer.write_all(&buf).await?;
        writer.write_all(&tag).await?;

        Ok(())
    }

    /// Minimum value of the `packet_length` field; together with the
    /// field itself this is the 16-byte minimum packet size.
    const MIN_LENGTH: usize = PACKET_MIN_SIZE - std::mem::size_of::<u32>();

    /// Minimum amount of padding bytes in any packet.
    const MIN_PADDING: usize = 4;
}

/// Allow types implementing [`BinWrite`] to be easily converted to a [`Packet`].
pub trait IntoPacket {
    /// Convert the current type to a [`Packet`].
    fn into_packet(self) -> Packet;
}

impl IntoPacket for Packet {
    fn into_packet(self) -> Packet {
        self
    }
}

impl<T: for<'a> BinWrite<Args<'a> = ()> + WriteEndian> IntoPacket for &T {
    fn into_packet(self) -> Packet {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.write(&mut buffer)
            .expect("failed to convert `impl BinWrite` type to Packet");

        Packet {
            payload: buffer.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    /// A cipher-less, mac-less transport configuration.
    #[derive(Debug, Default)]
    struct Clear;

    impl Mac for Clear {
        fn size(&self) -> usize {
            0
        }

        fn etm(&self) -> bool {
            false
        }
    }

    impl CipherCore for Clear {
        type Err = Error;
        type Mac = Self;

        fn mac(&self) -> &Self {
            self
        }

        fn block_size(&self) -> usize {
            8
        }

        fn aead(&self) -> bool {
            false
        }
    }

    impl OpeningCipher for Clear {
        fn reveal(&mut self, buf: &mut [u8], _seq: u32) -> Result<u32, Error> {
            Ok(u32::from_be_bytes(buf[..4].try_into().expect("4-byte read")))
        }

        fn open(&mut self, _buf: &mut [u8], _tag: Vec<u8>, _seq: u32) -> Result<(), Error> {
            Ok(())
        }

        fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Error> {
            Ok(buf)
        }
    }

    impl SealingCipher for Clear {
        fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>, Error> {
            Ok(buf.to_vec())
        }

        fn pad(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Error> {
            let align = self.block_size();
            let mut padding = align - (buf.len() + 5) % align;
            if padding < 4 {
                padding += align;
            }

            let mut padded = vec![padding as u8];
            padded.extend_from_slice(&buf);
            padded.resize(padded.len() + padding, 0);

            Ok(padded)
        }

        fn seal(&mut self, _buf: &mut [u8], _seq: u32) -> Result<Vec<u8>, Error> {
            Ok(Vec::new())
        }
    }

    #[async_std::test]
    async fn it_roundtrips_with_framing_invariants() {
        let packet = Packet {
            payload: b"\x15".to_vec(),
        };

        let mut buffer = Vec::new();
        packet
            .to_writer(&mut futures::io::Cursor::new(&mut buffer), &mut Clear, 0)
            .await
            .unwrap();

        let len = u32::from_be_bytes(buffer[..4].try_into().unwrap()) as usize;
        let padding = buffer[4] as usize;

        assert_eq!((len + 4) % 8, 0);
        assert!(len + 4 >= PACKET_MIN_SIZE);
        assert!((4..=255).contains(&padding));

        let read = Packet::from_reader(&mut futures::io::Cursor::new(&buffer), &mut Clear, 0)
            .await
            .unwrap();

        assert_eq!(read.payload, packet.payload);
    }

    #[async_std::test]
    async fn it_rejects_overlong_lengths() {
        let mut buffer = vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0];
        buffer.resize(64, 0);

        Packet::from_reader(&mut futures::io::Cursor::new(&buffer), &mut Clear, 0)
            .await
            .unwrap_err();
    }
}
