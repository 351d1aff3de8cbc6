use super::Mac;

/// Common traits of both sealing and opening cipher directions.
pub trait CipherCore {
    /// The error produced on cipher or integrity failure.
    type Err: From<std::io::Error> + From<binrw::Error> + From<crate::Error>;

    /// The [`Mac`] configured for this direction.
    type Mac: Mac;

    /// Access the configured [`Mac`].
    fn mac(&self) -> &Self::Mac;

    /// The cipher's block size, in bytes (at least `8` for framing purposes).
    fn block_size(&self) -> usize;

    /// Whether the cipher authenticates on its own (AEAD), which both
    /// suppresses the [`Mac`] and leaves the length field in cleartext.
    fn aead(&self) -> bool;

    /// Size of the trailing integrity material, the AEAD tag or the MAC digest.
    fn tag_size(&self) -> usize {
        if self.aead() {
            16
        } else {
            self.mac().size()
        }
    }

    /// Whether the 4-byte length field travels outside of the
    /// block-aligned, encrypted part of the packet (ETM and AEAD modes).
    fn clear_length(&self) -> bool {
        self.aead() || self.mac().etm()
    }
}

/// The receiving half of a transport cipher configuration.
pub trait OpeningCipher: CipherCore {
    /// Recover the cleartext `packet_length` from the first bytes read
    /// off the wire, decrypting `buf` in place where the mode requires it.
    ///
    /// `buf` is [`CipherCore::block_size`] bytes for classic ciphers and
    /// exactly `4` bytes when [`CipherCore::clear_length`] is set.
    fn reveal(&mut self, buf: &mut [u8], seq: u32) -> Result<u32, Self::Err>;

    /// Verify the integrity of the whole record and finish decrypting it.
    ///
    /// On entry `buf` holds the record as produced by [`Self::reveal`];
    /// on success it holds the fully decrypted
    /// `length ‖ padding_length ‖ payload ‖ padding` record.
    fn open(&mut self, buf: &mut [u8], tag: Vec<u8>, seq: u32) -> Result<(), Self::Err>;

    /// Decompress the `payload`, if so negociated.
    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err>;
}

/// The sending half of a transport cipher configuration.
pub trait SealingCipher: CipherCore {
    /// Compress the `payload`, if so negociated.
    fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>, Self::Err>;

    /// Prefix the compressed `payload` with the padding length and
    /// append random padding, per the mode's alignment rules.
    fn pad(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err>;

    /// Encrypt the `length ‖ padding_length ‖ payload ‖ padding` record in
    /// place per the mode's rules and produce its trailing MAC or AEAD tag.
    fn seal(&mut self, buf: &mut [u8], seq: u32) -> Result<Vec<u8>, Self::Err>;
}
