/// A _message authentication algorithm_ driving how much trailing
/// material a packet carries and how the length field travels.
pub trait Mac {
    /// Size of the produced digest, in bytes.
    fn size(&self) -> usize;

    /// Whether the digest is computed over the **encrypted** packet,
    /// leaving the length field in cleartext (`*-etm@openssh.com`).
    fn etm(&self) -> bool;
}
