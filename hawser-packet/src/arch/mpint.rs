use binrw::{BinRead, BinWrite};

use super::Bytes;

/// A `mpint` as defined in the SSH protocol, a multiple precision
/// integer in two's complement, big-endian, shortest-form encoding.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MpInt<'b>(Bytes<'b>);

impl MpInt<'_> {
    /// Create a [`MpInt`] from the big-endian magnitude of a _positive_ integer,
    /// stripping superfluous leading zeroes and re-padding if the
    /// most-significant bit would flag the number as negative.
    pub fn positive(bytes: &[u8]) -> MpInt<'static> {
        let magnitude = &bytes[bytes.iter().take_while(|&&byte| byte == 0).count()..];

        let mut vec = Vec::with_capacity(magnitude.len() + 1);
        if magnitude.first().is_some_and(|byte| byte & 0x80 != 0) {
            vec.push(0);
        }
        vec.extend_from_slice(magnitude);

        MpInt(Bytes::owned(vec))
    }

    /// Re-borrow the integer with a shorter lifetime.
    pub fn as_borrow(&self) -> MpInt<'_> {
        MpInt(self.0.as_borrow())
    }

    /// Extract the integer bytes into a [`Vec`].
    pub fn into_vec(self) -> Vec<u8> {
        self.0.into_vec()
    }
}

impl AsRef<[u8]> for MpInt<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl<'b> From<Bytes<'b>> for MpInt<'b> {
    fn from(value: Bytes<'b>) -> Self {
        Self(value)
    }
}

impl BinRead for MpInt<'_> {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        Bytes::read_options(reader, endian, args).map(Self)
    }
}

impl BinWrite for MpInt<'_> {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        self.0.write_options(writer, endian, args)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    // Vectors from <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
    #[rstest]
    #[case(&[], &[])]
    #[case(&[0x00], &[])]
    #[case(
        &[0x09, 0xa3, 0x78, 0xf9, 0xb2, 0xe3, 0x32, 0xa7],
        &[0x09, 0xa3, 0x78, 0xf9, 0xb2, 0xe3, 0x32, 0xa7]
    )]
    #[case(&[0x80], &[0x00, 0x80])]
    #[case(&[0x00, 0x00, 0x80], &[0x00, 0x80])]
    fn it_encodes_positive_shortest_form(#[case] magnitude: &[u8], #[case] expected: &[u8]) {
        assert_eq!(super::MpInt::positive(magnitude).as_ref(), expected);
    }
}
