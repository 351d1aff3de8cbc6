//! Service negociation in the transport protocol.
//!
//! The transport only carries services; requesting `ssh-userauth` and
//! driving the authentication exchange is the external authenticator's
//! job, sandwiched between the [`request`] for `ssh-userauth` and the
//! one for the connection service.

use hawser_packet::trans::{self, DisconnectReason};

use crate::{session::Hooks, Error, Pipe, Result, Session};

/// Request a _service_ from the peer, driving the initial key-exchange
/// beforehand if the session is not keyed yet.
pub async fn request<I, H>(session: &mut Session<I, H>, service_name: &str) -> Result<()>
where
    I: Pipe,
    H: Hooks,
{
    session.handshake().await?;

    session
        .send(&trans::ServiceRequest {
            service_name: service_name.into(),
        })
        .await?;

    let packet = session.recv().await?;
    if let Ok(trans::ServiceAccept {
        service_name: accepted,
    }) = packet.to()
    {
        if accepted.as_str() == service_name {
            Ok(())
        } else {
            session
                .disconnect(
                    DisconnectReason::ServiceNotAvailable,
                    "Accepted service is unknown, aborting.",
                )
                .await?;

            Err(Error::UnexpectedMessage)
        }
    } else {
        session
            .disconnect(
                DisconnectReason::ProtocolError,
                "Unexpected message outside of a service response, aborting.",
            )
            .await?;

        Err(Error::UnexpectedMessage)
    }
}
