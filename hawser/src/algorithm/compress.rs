use flate2::{Compression, FlushCompress, FlushDecompress, Status};
use hawser_packet::{arch::NameList, trans::KexInit, PACKET_MAX_SIZE};
use strum::{AsRefStr, EnumString};

use crate::{Error, Result};

use super::{Negociate, Rx, Tx};

impl Negociate<Tx> for Compress {
    const ERR: Error = Error::NoCommonCompression;

    fn field<'f>(kex: &'f KexInit) -> &'f NameList<'f> {
        &kex.compression_algorithms_client_to_server
    }
}

impl Negociate<Rx> for Compress {
    const ERR: Error = Error::NoCommonCompression;

    fn field<'f>(kex: &'f KexInit) -> &'f NameList<'f> {
        &kex.compression_algorithms_server_to_client
    }
}

/// Streaming state of a [`Compress`] direction.
///
/// The zlib dictionary builds up across packets, so the state must
/// survive both individual packets and re-keys for the stream to
/// stay decodable.
pub enum CompressState {
    /// State of the sending direction.
    Deflate(Box<flate2::Compress>),

    /// State of the receiving direction.
    Inflate(Box<flate2::Decompress>),
}

/// SSH compression algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Compress {
    /// No compression algorithm.
    #[default]
    None,

    /// zlib compression, deferred until the user has authenticated (OpenSSH mode).
    #[strum(serialize = "zlib@openssh.com")]
    ZlibOpenssh,

    /// zlib compression.
    Zlib,
}

impl Compress {
    /// Whether activation of the algorithm awaits authentication success.
    pub(crate) fn delayed(&self) -> bool {
        matches!(self, Self::ZlibOpenssh)
    }

    pub(crate) fn compress(
        &self,
        state: &mut Option<CompressState>,
        active: bool,
        buf: &[u8],
    ) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(buf.to_vec()),
            Self::ZlibOpenssh if !active => Ok(buf.to_vec()),
            Self::ZlibOpenssh | Self::Zlib => {
                let CompressState::Deflate(deflate) = state.get_or_insert_with(|| {
                    CompressState::Deflate(Box::new(flate2::Compress::new(
                        Compression::default(),
                        true,
                    )))
                }) else {
                    return Err(Error::Compress);
                };

                let mut out = Vec::with_capacity(buf.len() + 64);
                let mut read = 0;

                // A partial flush ends every packet on a byte boundary
                // while keeping the dictionary for the following ones.
                loop {
                    if out.len() == out.capacity() {
                        out.reserve(1024);
                    }

                    let before = deflate.total_in();
                    deflate
                        .compress_vec(&buf[read..], &mut out, FlushCompress::Partial)
                        .map_err(|_| Error::Compress)?;
                    read += (deflate.total_in() - before) as usize;

                    if read == buf.len() && out.len() < out.capacity() {
                        break Ok(out);
                    }
                }
            }
        }
    }

    pub(crate) fn decompress(
        &self,
        state: &mut Option<CompressState>,
        active: bool,
        buf: Vec<u8>,
    ) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(buf),
            Self::ZlibOpenssh if !active => Ok(buf),
            Self::ZlibOpenssh | Self::Zlib => {
                let CompressState::Inflate(inflate) = state.get_or_insert_with(|| {
                    CompressState::Inflate(Box::new(flate2::Decompress::new(true)))
                }) else {
                    return Err(Error::Compress);
                };

                let mut out = Vec::with_capacity(buf.len() * 2 + 64);
                let mut read = 0;

                loop {
                    if out.len() == out.capacity() {
                        out.reserve(1024);
                    }
                    if out.len() > PACKET_MAX_SIZE {
                        break Err(Error::Compress);
                    }

                    let before = inflate.total_in();
                    let status = inflate
                        .decompress_vec(&buf[read..], &mut out, FlushDecompress::None)
                        .map_err(|_| Error::Compress)?;
                    read += (inflate.total_in() - before) as usize;

                    if status == Status::StreamEnd
                        || (read == buf.len() && out.len() < out.capacity())
                    {
                        break Ok(out);
                    }
                }
            }
        }
    }
}
