use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::info;

use arq_lab_abstract::{Command, Message, ProtocolConfig};
use arq_lab_core::Link;

use crate::SessionError;

/// Initiating side: sends bare requests, receives windowed replies.
pub struct Client<S> {
    link: Link<S>,
}

impl Client<TcpStream> {
    pub async fn connect(
        addr: impl ToSocketAddrs,
        config: ProtocolConfig,
    ) -> Result<Self, SessionError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(SessionError::Connect)?;
        stream.set_nodelay(true).map_err(SessionError::Connect)?;
        info!("connected to {}", stream.peer_addr().map_err(SessionError::Connect)?);
        Ok(Self::new(stream, config))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: ProtocolConfig) -> Self {
        Self {
            link: Link::new(stream, config),
        }
    }

    pub fn link_mut(&mut self) -> &mut Link<S> {
        &mut self.link
    }

    /// Send one request and wait for the reply. `EXIT` has no reply.
    pub async fn request(
        &mut self,
        command: Command,
        data: impl Into<String>,
    ) -> Result<Option<Message>, SessionError> {
        let message = Message::new(command, data);
        self.link.send_request(&message).await?;
        if command == Command::Exit {
            return Ok(None);
        }
        Ok(Some(self.link.recv_message().await?))
    }

    /// End the session and close the write half.
    pub async fn exit(mut self) -> Result<(), SessionError> {
        self.request(Command::Exit, "").await?;
        let mut stream = self.link.into_inner();
        // already finished from the peer's point of view
        let _ = stream.shutdown().await;
        Ok(())
    }
}
