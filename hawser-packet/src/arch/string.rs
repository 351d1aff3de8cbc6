use binrw::{BinRead, BinWrite};

use super::Bytes;

/// A `string` as defined in the SSH protocol, restricted to valid **UTF-8**.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Utf8<'b>(Bytes<'b>);

impl<'b> Utf8<'b> {
    /// Create an [`Utf8`] string from a _borrowed_ [`str`].
    pub const fn borrowed(value: &'b str) -> Self {
        Self(Bytes::borrowed(value.as_bytes()))
    }

    /// Views this [`Utf8`] as a [`str`].
    pub fn as_str(&self) -> &str {
        self
    }

    /// Converts the [`Utf8`] to a [`String`].
    pub fn into_string(self) -> String {
        String::from_utf8(self.0.into_vec())
            .expect("Utf8 was constructed from a non-UTF-8 buffer")
    }
}

impl std::ops::Deref for Utf8<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        std::str::from_utf8(self.0.as_ref())
            .expect("Utf8 was constructed from a non-UTF-8 buffer")
    }
}

impl std::fmt::Display for Utf8<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self)
    }
}

impl From<String> for Utf8<'_> {
    fn from(value: String) -> Self {
        Self(Bytes::owned(value.into_bytes()))
    }
}

impl<'b> From<&'b str> for Utf8<'b> {
    fn from(value: &'b str) -> Self {
        Self::borrowed(value)
    }
}

impl BinRead for Utf8<'_> {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let pos = reader.stream_position()?;
        let bytes = Bytes::read_options(reader, endian, args)?;

        if std::str::from_utf8(bytes.as_ref()).is_err() {
            return Err(binrw::Error::Custom {
                pos,
                err: Box::new("the string contained non-UTF-8 characters"),
            });
        }

        Ok(Self(bytes))
    }
}

impl BinWrite for Utf8<'_> {
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

/// A `string` as defined in the SSH protocol, restricted to valid **ASCII**.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ascii<'b>(Utf8<'b>);

impl<'b> Ascii<'b> {
    /// Create an [`Ascii`] string from a _borrowed_ [`str`].
    ///
    /// Mostly useful for the [`ascii!`](crate::ascii) macro,
    /// ASCII-ness is only verified when serialized.
    pub const fn borrowed(value: &'b str) -> Self {
        Self(Utf8::borrowed(value))
    }

    /// Views this [`Ascii`] as a [`str`].
    pub fn as_str(&self) -> &str {
        self
    }

    /// Converts the [`Ascii`] to a [`String`].
    pub fn into_string(self) -> String {
        self.0.into_string()
    }
}

impl std::ops::Deref for Ascii<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for Ascii<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self)
    }
}

impl From<String> for Ascii<'_> {
    fn from(value: String) -> Self {
        Self(value.chars().filter(char::is_ascii).collect::<String>().into())
    }
}

impl<'b> From<&'b str> for Ascii<'b> {
    fn from(value: &'b str) -> Self {
        Self::borrowed(value)
    }
}

impl BinRead for Ascii<'_> {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let pos = reader.stream_position()?;
        let inner = Utf8::read_options(reader, endian, args)?;

        if !inner.is_ascii() {
            return Err(binrw::Error::Custom {
                pos,
                err: Box::new("the string contained non-ASCII characters"),
            });
        }

        Ok(Self(inner))
    }
}

impl BinWrite for Ascii<'_> {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        if !self.is_ascii() {
            return Err(binrw::Error::AssertFail {
                pos: writer.stream_position()?,
                message: "the string contained non-ASCII characters".into(),
            });
        }

        self.0.write_options(writer, endian, args)
    }
}

/// Create a const [`Ascii`] string from a literal.
#[macro_export]
macro_rules! ascii {
    ($str:literal) => {
        $crate::arch::Ascii::borrowed($str)
    };
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn it_rejects_non_utf8() {
        let mut buffer = std::io::Cursor::new([0x00, 0x00, 0x00, 0x02, 0xc3, 0x28].to_vec());

        Utf8::read(&mut buffer).unwrap_err();
    }

    #[test]
    fn it_rejects_non_ascii() {
        let mut buffer = std::io::Cursor::new(Vec::new());
        Utf8::from("utf∞").write(&mut buffer).unwrap();

        buffer.set_position(0);
        Ascii::read(&mut buffer).unwrap_err();
    }

    #[test]
    fn it_compares_as_str() {
        assert_eq!(ascii!("ssh-connection"), Ascii::from("ssh-connection"));
    }
}
