use digest::OutputSizeUser;
use hawser_packet::{arch::NameList, trans::KexInit};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use strum::{AsRefStr, EnumString};

use crate::Error;

use super::{Negociate, Rx, Tx};

impl Negociate<Tx> for Hmac {
    const ERR: Error = Error::NoCommonHmac;

    fn field<'f>(kex: &'f KexInit) -> &'f NameList<'f> {
        &kex.mac_algorithms_client_to_server
    }
}

impl Negociate<Rx> for Hmac {
    const ERR: Error = Error::NoCommonHmac;

    fn field<'f>(kex: &'f KexInit) -> &'f NameList<'f> {
        &kex.mac_algorithms_server_to_client
    }
}

/// SSH hmac algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Hmac {
    /// HMAC with sha-2-256 digest.
    #[strum(serialize = "hmac-sha2-256")]
    HmacSha256,

    /// HMAC with sha-2-512 digest.
    #[strum(serialize = "hmac-sha2-512")]
    HmacSha512,

    /// HMAC with sha-1 digest.
    HmacSha1,

    /// HMAC with sha-2-256 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-256-etm@openssh.com")]
    HmacSha256ETM,

    /// HMAC with sha-2-512 digest on encrypted message.
    #[strum(serialize = "hmac-sha2-512-etm@openssh.com")]
    HmacSha512ETM,

    /// HMAC with sha-1 digest on encrypted message.
    #[strum(serialize = "hmac-sha1-etm@openssh.com")]
    HmacSha1ETM,

    /// No HMAC algorithm.
    #[default]
    None,
}

impl Hmac {
    pub(crate) fn verify(
        &self,
        seq: u32,
        buf: &[u8],
        key: &[u8],
        mac: &[u8],
    ) -> Result<(), digest::MacError> {
        fn verify<D: digest::Mac + digest::KeyInit>(
            seq: u32,
            buf: &[u8],
            key: &[u8],
            mac: &[u8],
        ) -> Result<(), digest::MacError> {
            <D as digest::Mac>::new_from_slice(key)
                .expect("Key derivation failed horribly")
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .verify_slice(mac)
        }

        match self {
            Self::HmacSha512ETM | Self::HmacSha512 => {
                verify::<hmac::Hmac<Sha512>>(seq, buf, key, mac)
            }
            Self::HmacSha256ETM | Self::HmacSha256 => {
                verify::<hmac::Hmac<Sha256>>(seq, buf, key, mac)
            }
            Self::HmacSha1ETM | Self::HmacSha1 => verify::<hmac::Hmac<Sha1>>(seq, buf, key, mac),
            Self::None => Ok(()),
        }
    }

    pub(crate) fn sign(&self, seq: u32, buf: &[u8], key: &[u8]) -> Vec<u8> {
        fn sign<D: digest::Mac + digest::KeyInit>(seq: u32, buf: &[u8], key: &[u8]) -> Vec<u8> {
            <D as digest::Mac>::new_from_slice(key)
                .expect("Key derivation failed horribly")
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .finalize()
                .into_bytes()
                .to_vec()
        }

        match self {
            Self::HmacSha512ETM | Self::HmacSha512 => sign::<hmac::Hmac<Sha512>>(seq, buf, key),
            Self::HmacSha256ETM | Self::HmacSha256 => sign::<hmac::Hmac<Sha256>>(seq, buf, key),
            Self::HmacSha1ETM | Self::HmacSha1 => sign::<hmac::Hmac<Sha1>>(seq, buf, key),
            Self::None => Default::default(),
        }
    }

    pub(crate) fn size(&self) -> usize {
        match self {
            Self::HmacSha512ETM | Self::HmacSha512 => Sha512::output_size(),
            Self::HmacSha256ETM | Self::HmacSha256 => Sha256::output_size(),
            Self::HmacSha1ETM | Self::HmacSha1 => Sha1::output_size(),
            Self::None => 0,
        }
    }

    pub(crate) fn etm(&self) -> bool {
        matches!(
            self,
            Self::HmacSha512ETM | Self::HmacSha256ETM | Self::HmacSha1ETM
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Hmac::HmacSha256, "hmac-sha2-256")]
    #[case(Hmac::HmacSha512ETM, "hmac-sha2-512-etm@openssh.com")]
    #[case(Hmac::HmacSha1, "hmac-sha1")]
    #[case(Hmac::None, "none")]
    fn it_names_macs(#[case] hmac: Hmac, #[case] name: &str) {
        assert_eq!(hmac.as_ref(), name);
        assert_eq!(name.parse::<Hmac>().unwrap(), hmac);
    }

    #[rstest]
    #[case(Hmac::HmacSha256)]
    #[case(Hmac::HmacSha512)]
    #[case(Hmac::HmacSha1)]
    fn it_signs_and_verifies(#[case] hmac: Hmac) {
        let key = vec![0x0b; hmac.size()];

        let mac = hmac.sign(7, b"payload", &key);
        assert_eq!(mac.len(), hmac.size());

        hmac.verify(7, b"payload", &key, &mac).unwrap();
        hmac.verify(8, b"payload", &key, &mac).unwrap_err();
        hmac.verify(7, b"tampered", &key, &mac).unwrap_err();
    }
}
