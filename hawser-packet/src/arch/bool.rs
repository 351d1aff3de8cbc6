use binrw::binrw;

/// A `boolean` as defined in the SSH protocol,
/// any non-zero byte reads as `true`.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4251#section-5>.
#[binrw]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[br(map = |byte: u8| Self(byte != 0))]
#[bw(map = |&Self(value)| u8::from(value))]
pub struct Bool(pub bool);

impl std::ops::Deref for Bool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<bool> for Bool {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

impl From<Bool> for bool {
    fn from(value: Bool) -> Self {
        value.0
    }
}
