use binrw::{BinRead, BinWrite};

use super::Ascii;

/// A `name-list` as defined in the SSH protocol,
/// a comma-separated list of ASCII names.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NameList<'b>(Ascii<'b>);

impl<'b> NameList<'b> {
    /// Create a [`NameList`] from its comma-separated representation.
    pub const fn borrowed(value: &'b str) -> Self {
        Self(Ascii::borrowed(value))
    }

    /// Iterate over the names in the list.
    ///
    /// An empty list yields no names at all.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.as_str().split(',').filter(|name| !name.is_empty())
    }

    /// Whether the list contains the provided `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|own| own == name)
    }

    /// Find the first of _our_ names that also appears in `other`,
    /// the selection rule of [RFC4253 section 7.1](https://datatracker.ietf.org/doc/html/rfc4253#section-7.1).
    pub fn preferred_in(&self, other: &NameList) -> Option<&str> {
        self.names().find(|name| other.contains(name))
    }

    /// Views the [`NameList`] as its comma-separated [`str`] form.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<A: AsRef<str>> FromIterator<A> for NameList<'_> {
    fn from_iter<T: IntoIterator<Item = A>>(iter: T) -> Self {
        let joined = iter
            .into_iter()
            .map(|name| name.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join(",");

        Self(joined.into())
    }
}

impl BinRead for NameList<'_> {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        Ascii::read_options(reader, endian, args).map(Self)
    }
}

impl BinWrite for NameList<'_> {
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

    use super::*;

    #[rstest]
    #[case("", &[])]
    #[case("zlib", &["zlib"])]
    #[case("zlib,none", &["zlib", "none"])]
    #[case("zlib,none,", &["zlib", "none"])] // tolerate a trailing comma
    fn it_splits_names(#[case] text: &str, #[case] expected: &[&str]) {
        assert_eq!(
            NameList::borrowed(text).names().collect::<Vec<_>>(),
            expected
        );
    }

    #[test]
    fn it_selects_ours_first() {
        let ours = NameList::borrowed("aes128-ctr,aes256-ctr");
        let theirs = NameList::borrowed("aes256-ctr,aes128-ctr");

        assert_eq!(ours.preferred_in(&theirs), Some("aes128-ctr"));
    }

    #[test]
    fn it_selects_none_without_overlap() {
        let ours = NameList::borrowed("aes128-ctr");
        let theirs = NameList::borrowed("3des-cbc");

        assert_eq!(ours.preferred_in(&theirs), None);
    }

    #[test]
    fn it_collects_from_names() {
        let list = NameList::from_iter(["none", "zlib@openssh.com"]);

        assert_eq!(list.as_str(), "none,zlib@openssh.com");
    }
}
