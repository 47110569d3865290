//! Message envelope: a fixed-width command tag followed by UTF-8 text.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::consts::TAG_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    /// Terminate the session.
    Exit,
    Chat,
    /// Request a file by name; the reply carries its base64 body.
    File,
    #[serde(rename = "ERRO")]
    Error,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Exit, Command::Chat, Command::File, Command::Error];

    pub fn tag(self) -> &'static [u8; TAG_LEN] {
        match self {
            Command::Exit => b"EXIT",
            Command::Chat => b"CHAT",
            Command::File => b"FILE",
            Command::Error => b"ERRO",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Command> {
        Command::ALL.into_iter().find(|c| c.tag() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Command::Exit => "EXIT",
            Command::Chat => "CHAT",
            Command::File => "FILE",
            Command::Error => "ERRO",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::from_tag(s.trim().to_ascii_uppercase().as_bytes())
            .ok_or_else(|| EnvelopeError::UnknownCommand(s.trim().to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope of {len} bytes is shorter than the {TAG_LEN}-byte command tag")]
    Truncated { len: usize },
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("envelope data is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub command: Command,
    pub data: String,
}

impl Message {
    pub fn new(command: Command, data: impl Into<String>) -> Self {
        Self {
            command,
            data: data.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(TAG_LEN + self.data.len());
        buf.put_slice(self.command.tag());
        buf.put_slice(self.data.as_bytes());
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, EnvelopeError> {
        if bytes.len() < TAG_LEN {
            return Err(EnvelopeError::Truncated { len: bytes.len() });
        }
        let (tag, data) = bytes.split_at(TAG_LEN);
        let command = Command::from_tag(tag).ok_or_else(|| {
            EnvelopeError::UnknownCommand(String::from_utf8_lossy(tag).into_owned())
        })?;
        let data = std::str::from_utf8(data)?;
        Ok(Message::new(command, data))
    }
}
