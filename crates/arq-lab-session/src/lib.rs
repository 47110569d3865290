//! Session layer on top of the reliability link: a responder that dispatches
//! the closed command set, an initiator client, and the file store behind
//! `FILE` requests.

pub mod cli;
pub mod client;
pub mod files;
pub mod server;

pub use cli::ProtocolArgs;
pub use client::Client;
pub use files::{FileError, FileStore, save_download};
pub use server::{ChatResponder, ConnectionCounter, Echo, Responder, run_server};

use arq_lab_core::LinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error(transparent)]
    File(#[from] FileError),
}

impl SessionError {
    /// Whether the connection is still usable after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::Link(LinkError::RequestTooLarge { .. }))
    }
}
