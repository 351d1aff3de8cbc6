use hawser_packet::{arch::NameList, trans::KexInit};
use signature::Verifier;
use ssh_key::{public::KeyData, Algorithm, Certificate, HashAlg, PublicKey, Signature};
use strum::{AsRefStr, EnumString};

use crate::{Error, Result};

use super::Negociate;

impl Negociate for Key {
    const ERR: Error = Error::NoCommonKey;

    fn field<'f>(kex: &'f KexInit) -> &'f NameList<'f> {
        &kex.server_host_key_algorithms
    }
}

/// SSH host-key algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, EnumString, AsRefStr)]
pub enum Key {
    /// Ed25519 key in an OpenSSH certificate.
    #[strum(serialize = "ssh-ed25519-cert-v01@openssh.com")]
    Ed25519Cert,

    /// ECDSA key on the nistp256 curve in an OpenSSH certificate.
    #[strum(serialize = "ecdsa-sha2-nistp256-cert-v01@openssh.com")]
    EcdsaNistP256Cert,

    /// ECDSA key on the nistp384 curve in an OpenSSH certificate.
    #[strum(serialize = "ecdsa-sha2-nistp384-cert-v01@openssh.com")]
    EcdsaNistP384Cert,

    /// ECDSA key on the nistp521 curve in an OpenSSH certificate.
    #[strum(serialize = "ecdsa-sha2-nistp521-cert-v01@openssh.com")]
    EcdsaNistP521Cert,

    /// RSA key with a sha-2-512 signature in an OpenSSH certificate.
    #[strum(serialize = "rsa-sha2-512-cert-v01@openssh.com")]
    RsaSha512Cert,

    /// RSA key with a sha-2-256 signature in an OpenSSH certificate.
    #[strum(serialize = "rsa-sha2-256-cert-v01@openssh.com")]
    RsaSha256Cert,

    /// RSA key with the legacy sha-1 signature in an OpenSSH certificate.
    #[strum(serialize = "ssh-rsa-cert-v01@openssh.com")]
    SshRsaCert,

    /// Ed25519 key.
    #[strum(serialize = "ssh-ed25519")]
    Ed25519,

    /// ECDSA key on the nistp256 curve.
    #[strum(serialize = "ecdsa-sha2-nistp256")]
    EcdsaNistP256,

    /// ECDSA key on the nistp384 curve.
    #[strum(serialize = "ecdsa-sha2-nistp384")]
    EcdsaNistP384,

    /// ECDSA key on the nistp521 curve.
    #[strum(serialize = "ecdsa-sha2-nistp521")]
    EcdsaNistP521,

    /// RSA key with a sha-2-512 signature.
    #[strum(serialize = "rsa-sha2-512")]
    RsaSha512,

    /// RSA key with a sha-2-256 signature.
    #[strum(serialize = "rsa-sha2-256")]
    RsaSha256,

    /// RSA key with the legacy sha-1 signature.
    #[strum(serialize = "ssh-rsa")]
    SshRsa,
}

/// A host key as presented by the server, either a plain public key
/// or an OpenSSH certificate.
///
/// Certificate trust (CA, principals, validity) is the host-key
/// hook's responsibility.
#[derive(Debug, Clone)]
pub enum HostKey {
    /// A plain public key.
    Public(PublicKey),

    /// An OpenSSH certificate; the exchange signature has been checked
    /// against the certified public key.
    Certificate(Certificate),
}

impl Key {
    /// Whether the algorithm transports an OpenSSH certificate.
    pub(crate) fn is_cert(&self) -> bool {
        matches!(
            self,
            Self::Ed25519Cert
                | Self::EcdsaNistP256Cert
                | Self::EcdsaNistP384Cert
                | Self::EcdsaNistP521Cert
                | Self::RsaSha512Cert
                | Self::RsaSha256Cert
                | Self::SshRsaCert
        )
    }

    /// Whether the negociated algorithm matches the type of key material
    /// the server actually presented.
    fn matches(&self, data: &KeyData) -> bool {
        use ssh_key::EcdsaCurve;

        matches!(
            (self, data.algorithm()),
            (Self::Ed25519 | Self::Ed25519Cert, Algorithm::Ed25519)
                | (
                    Self::EcdsaNistP256 | Self::EcdsaNistP256Cert,
                    Algorithm::Ecdsa {
                        curve: EcdsaCurve::NistP256
                    },
                )
                | (
                    Self::EcdsaNistP384 | Self::EcdsaNistP384Cert,
                    Algorithm::Ecdsa {
                        curve: EcdsaCurve::NistP384
                    },
                )
                | (
                    Self::EcdsaNistP521 | Self::EcdsaNistP521Cert,
                    Algorithm::Ecdsa {
                        curve: EcdsaCurve::NistP521
                    },
                )
                | (
                    Self::RsaSha512
                        | Self::RsaSha256
                        | Self::SshRsa
                        | Self::RsaSha512Cert
                        | Self::RsaSha256Cert
                        | Self::SshRsaCert,
                    Algorithm::Rsa { .. },
                )
        )
    }

    /// The signature algorithm the negociated slot commands; for RSA the
    /// signature name differs from the `ssh-rsa` key blob name.
    fn signature_algorithm(&self) -> Algorithm {
        match self {
            Self::Ed25519 | Self::Ed25519Cert => Algorithm::Ed25519,
            Self::EcdsaNistP256 | Self::EcdsaNistP256Cert => Algorithm::Ecdsa {
                curve: ssh_key::EcdsaCurve::NistP256,
            },
            Self::EcdsaNistP384 | Self::EcdsaNistP384Cert => Algorithm::Ecdsa {
                curve: ssh_key::EcdsaCurve::NistP384,
            },
            Self::EcdsaNistP521 | Self::EcdsaNistP521Cert => Algorithm::Ecdsa {
                curve: ssh_key::EcdsaCurve::NistP521,
            },
            Self::RsaSha512 | Self::RsaSha512Cert => Algorithm::Rsa {
                hash: Some(HashAlg::Sha512),
            },
            Self::RsaSha256 | Self::RsaSha256Cert => Algorithm::Rsa {
                hash: Some(HashAlg::Sha256),
            },
            Self::SshRsa | Self::SshRsaCert => Algorithm::Rsa { hash: None },
        }
    }

    /// Parse the presented host-key blob and verify the exchange-hash
    /// signature with it.
    pub(crate) fn verify(&self, blob: &[u8], hash: &[u8], signature: &[u8]) -> Result<HostKey> {
        let signature = Signature::try_from(signature)?;

        if signature.algorithm() != self.signature_algorithm() {
            return Err(Error::KexFailed);
        }

        if self.is_cert() {
            let certificate = Certificate::from_bytes(blob)?;

            if !self.matches(certificate.public_key()) {
                return Err(Error::KexFailed);
            }

            let key = PublicKey::from(certificate.public_key().clone());
            Verifier::verify(&key, hash, &signature)?;

            Ok(HostKey::Certificate(certificate))
        } else {
            let key = PublicKey::from_bytes(blob)?;

            if !self.matches(key.key_data()) {
                return Err(Error::KexFailed);
            }

            Verifier::verify(&key, hash, &signature)?;

            Ok(HostKey::Public(key))
        }
    }
}
