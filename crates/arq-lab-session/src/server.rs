use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use arq_lab_abstract::{Command, EnvelopeError, Message, ProtocolConfig};
use arq_lab_core::{Link, Request};

use crate::SessionError;
use crate::files::FileStore;

pub const NOT_FOUND: &str = "Command not found";

/// Produces the answer to a `CHAT` request.
pub trait ChatResponder: Send + Sync {
    fn reply(&self, text: &str) -> String;
}

/// Sends the chat text straight back.
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

impl ChatResponder for Echo {
    fn reply(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Live connection count, for logs only.
#[derive(Debug, Default, Clone)]
pub struct ConnectionCounter(Arc<AtomicUsize>);

impl ConnectionCounter {
    pub fn opened(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn closed(&self) -> usize {
        self.0.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn current(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Answers requests on one connection until `EXIT` or hangup.
#[derive(Clone)]
pub struct Responder {
    config: ProtocolConfig,
    files: FileStore,
    chat: Arc<dyn ChatResponder>,
}

impl Responder {
    pub fn new(config: ProtocolConfig, files: FileStore) -> Self {
        Self {
            config,
            files,
            chat: Arc::new(Echo),
        }
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatResponder>) -> Self {
        self.chat = chat;
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Reply for one decoded request. `None` ends the session.
    pub async fn reply_to(&self, request: Result<Message, EnvelopeError>) -> Option<Message> {
        let message = match request {
            Ok(message) => message,
            Err(EnvelopeError::UnknownCommand(tag)) => {
                warn!("unknown command {tag:?}");
                return Some(Message::new(Command::Error, NOT_FOUND));
            }
            Err(err) => {
                warn!("malformed request: {err}");
                return Some(Message::new(Command::Error, format!("Malformed request: {err}")));
            }
        };

        match message.command {
            Command::Exit => None,
            Command::Chat => {
                info!("CLIENT: {}", message.data);
                Some(Message::new(Command::Chat, self.chat.reply(&message.data)))
            }
            Command::File => match self.files.read_base64(&message.data).await {
                Ok(body) => Some(Message::new(Command::File, body)),
                Err(err) => {
                    warn!("FILE {:?}: {err}", message.data);
                    Some(Message::new(Command::Error, err.to_string()))
                }
            },
            Command::Error => Some(Message::new(Command::Error, NOT_FOUND)),
        }
    }

    /// Serve one connection. Returns the number of requests answered.
    pub async fn serve<S>(&self, stream: S, peer: &str) -> Result<u32, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut link = Link::new(stream, self.config.clone());
        let mut answered = 0;

        loop {
            let request = match link.read_request().await? {
                Request::Closed => {
                    info!("{peer} hung up");
                    break;
                }
                Request::Message(message) => Ok(message),
                Request::Invalid(err) => Err(err),
            };

            let Some(reply) = self.reply_to(request).await else {
                info!("{peer} sent EXIT");
                break;
            };
            let stats = link.send_message(&reply).await?;
            answered += 1;
            info!(
                "{peer}: {} reply delivered ({} frames, {} rounds)",
                reply.command, stats.frames, stats.rounds
            );
        }
        Ok(answered)
    }
}

/// Accept connections forever, one task each.
pub async fn run_server(
    listener: TcpListener,
    responder: Responder,
    connections: ConnectionCounter,
) -> std::io::Result<()> {
    info!("listening on {}", listener.local_addr()?);
    loop {
        let (stream, addr) = listener.accept().await?;
        if let Err(err) = stream.set_nodelay(true) {
            warn!("cannot disable Nagle for {addr}: {err}");
        }
        let responder = responder.clone();
        let connections = connections.clone();
        info!(
            "connection from {addr} established ({} active)",
            connections.opened()
        );

        tokio::spawn(async move {
            let peer = addr.to_string();
            match responder.serve(stream, &peer).await {
                Ok(answered) => info!("connection from {peer} closed after {answered} requests"),
                Err(err) => error!("connection from {peer} failed: {err}"),
            }
            info!("{} active connections", connections.closed());
        });
    }
}
