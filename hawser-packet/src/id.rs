use futures::io::{AsyncBufReadExt, AsyncReadExt};

use crate::{Error, Result};

const VERSIONS: &[&str] = &["2.0", "1.99"];

/// Maximum size of the identification string (and of any banner line
/// preceding it), terminator included.
const MAX_LINE_SIZE: usize = 255;

/// Maximum count of banner lines tolerated before the identification string.
const MAX_BANNER_LINES: usize = 128;

/// The SSH identification string as defined in the SSH protocol.
///
/// The format must match the following pattern:
/// `SSH-<protoversion>-<softwareversion>[ <comments>]`.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-4.2>.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Id {
    /// The SSH's protocol version, either `2.0` or the compatibility `1.99`.
    pub protoversion: String,

    /// A string identifying the software curently used, in example `billsSSH_3.6.3q3`.
    pub softwareversion: String,

    /// Optional comments with additionnal informations about the software.
    pub comments: Option<String>,
}

impl Id {
    /// Convenience method to create an `SSH-2.0` identifier string.
    pub fn v2(softwareversion: impl Into<String>, comments: Option<impl Into<String>>) -> Self {
        Self {
            protoversion: "2.0".into(),
            softwareversion: softwareversion.into(),
            comments: comments.map(Into::into),
        }
    }

    /// Read an [`Id`] from the provided asynchronous `reader`,
    /// discarding the _banner lines_ a server may send before identifying.
    pub async fn from_reader<R>(reader: &mut R) -> Result<(Self, Vec<String>)>
    where
        R: futures::io::AsyncBufRead + Unpin,
    {
        let mut banner = Vec::new();

        loop {
            let mut line = String::with_capacity(MAX_LINE_SIZE);
            let read = (&mut *reader)
                .take(MAX_LINE_SIZE as u64)
                .read_line(&mut line)
                .await?;

            if read == 0 {
                break Err(Error::UnexpectedEof);
            }
            if !line.ends_with('\n') {
                break Err(Error::BadIdentifer(line));
            }

            let line = line.trim_end_matches(['\r', '\n']);

            if line.starts_with("SSH-") {
                let id: Id = line.parse()?;

                if !VERSIONS.contains(&&*id.protoversion) {
                    break Err(Error::UnsupportedVersion(id.protoversion));
                }

                break Ok((id, banner));
            }

            if banner.len() == MAX_BANNER_LINES {
                break Err(Error::BadIdentifer(line.into()));
            }
            banner.push(line.to_owned());
        }
    }

    /// Write the [`Id`] to the provided asynchronous `writer`.
    pub async fn to_writer<W>(&self, writer: &mut W) -> Result<()>
    where
        W: futures::io::AsyncWrite + Unpin,
    {
        use futures::io::AsyncWriteExt;

        writer.write_all(self.to_string().as_bytes()).await?;
        writer.write_all(b"\r\n").await?;

        Ok(())
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SSH-{}-{}", self.protoversion, self.softwareversion)?;

        if let Some(comments) = &self.comments {
            write!(f, " {comments}")?;
        }

        Ok(())
    }
}

impl std::str::FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, comments) = s
            .split_once(' ')
            .map_or_else(|| (s, None), |(id, comments)| (id, Some(comments)));

        match id.splitn(3, '-').collect::<Vec<_>>()[..] {
            ["SSH", protoversion, softwareversion]
                if !protoversion.is_empty() && !softwareversion.is_empty() =>
            {
                Ok(Self {
                    protoversion: protoversion.to_string(),
                    softwareversion: softwareversion.to_string(),
                    comments: comments.map(str::to_string),
                })
            }
            _ => Err(Error::BadIdentifer(s.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use rstest::rstest;
    use std::str::FromStr;

    use super::*;

    #[rstest]
    #[case("SSH-2.0-billsSSH_3.6.3q3")]
    #[case("SSH-1.99-billsSSH_3.6.3q3")]
    #[case("SSH-2.0-billsSSH_3.6.3q3 with-comment")]
    #[case("SSH-2.0-billsSSH_3.6.3q3 ")] // empty comment
    fn it_parses_valid(#[case] text: &str) {
        Id::from_str(text).expect(text);
    }

    #[rstest]
    #[case("")]
    #[case("FOO-2.0-billsSSH_3.6.3q3")]
    #[case("-2.0-billsSSH_3.6.3q3")]
    #[case("SSH--billsSSH_3.6.3q3")]
    #[case("SSH-2.0-")]
    fn it_rejects_invalid(#[case] text: &str) {
        Id::from_str(text).expect_err(text);
    }

    #[rstest]
    #[case(Id::v2("billsSSH_3.6.3q3", None::<String>))]
    #[case(Id::v2("billsSSH_3.6.3q3", Some("with-comment")))]
    fn it_reparses_consistently(#[case] id: Id) {
        assert_eq!(id, id.to_string().parse().unwrap());
    }

    #[async_std::test]
    async fn it_skips_banner_lines() {
        let mut reader = futures::io::Cursor::new(b"Hello\r\nSSH-2.0-Foo_1.0\r\n".to_vec());

        let (id, banner) = Id::from_reader(&mut reader).await.unwrap();

        assert_eq!(id, Id::v2("Foo_1.0", None::<String>));
        assert_eq!(banner, ["Hello"]);
    }

    #[async_std::test]
    async fn it_rejects_older_protocols() {
        let mut reader = futures::io::Cursor::new(b"SSH-1.5-ancient\r\n".to_vec());

        assert!(matches!(
            Id::from_reader(&mut reader).await,
            Err(Error::UnsupportedVersion(version)) if version == "1.5"
        ));
    }
}
