//! Drives the window and the reassembler over a reliable byte stream.
//!
//! Responder → initiator traffic is framed, windowed and acknowledged.
//! Initiator → responder requests travel as a bare envelope in one write.
//!
//! The initiator writes its next request only after it holds the whole
//! reply, so request bytes that show up while a reply is still in flight
//! acknowledge everything that is left of it. Those bytes stay buffered for
//! [`Link::read_request`].
//!
//! Frames carry no message identity. If the final ACK is lost and the round
//! deadline passes before the next request arrives, the retransmitted final
//! frame reaches the initiator after it has sent that request, and is
//! accepted as its reply.
//!
//! Frame reads are assumed to start on a frame boundary; a frame split
//! across two reads is not reassembled.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use arq_lab_abstract::consts::{ACK_LEN, MAX_REQUEST_LEN};
use arq_lab_abstract::frame::{FrameError, split_frames};
use arq_lab_abstract::{EnvelopeError, Message, ProtocolConfig, ack};

use crate::fault::FaultInjector;
use crate::reassembler::{Reassembler, Verdict};
use crate::window::SendWindow;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer closed the connection")]
    Closed,
    #[error("cannot frame message: {0}")]
    Frame(#[from] FrameError),
    #[error("received message is malformed: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("request of {len} bytes does not fit the peer's {max}-byte read")]
    RequestTooLarge { len: usize, max: usize },
    #[error("gave up after {rounds} rounds with {acked} of {total} frames acknowledged")]
    RetriesExhausted { rounds: u32, acked: usize, total: usize },
}

/// Counters for one outbound transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub frames: usize,
    pub rounds: u32,
    pub frames_sent: u32,
    pub acks_observed: u32,
    /// Rounds whose ACK collection ended on the deadline.
    pub timeouts: u32,
}

/// An inbound request on the unframed direction.
#[derive(Debug)]
pub enum Request {
    Message(Message),
    Invalid(EnvelopeError),
    Closed,
}

/// ACKs gathered during one round.
struct Collected {
    acks: Vec<u32>,
    /// The peer sent something other than ACKs: it already has the message.
    peer_moved_on: bool,
}

pub struct Link<S> {
    stream: S,
    config: ProtocolConfig,
    faults: FaultInjector,
    /// Bytes read from the peer but not yet consumed.
    inbox: BytesMut,
}

impl<S> Link<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: ProtocolConfig) -> Self {
        let faults = FaultInjector::new(&config.faults);
        Self::with_faults(stream, config, faults)
    }

    pub fn with_faults(stream: S, config: ProtocolConfig, faults: FaultInjector) -> Self {
        Self {
            stream,
            config,
            faults,
            inbox: BytesMut::new(),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn faults_mut(&mut self) -> &mut FaultInjector {
        &mut self.faults
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub async fn send_request(&mut self, message: &Message) -> Result<(), LinkError> {
        let encoded = message.encode();
        if encoded.len() > MAX_REQUEST_LEN {
            return Err(LinkError::RequestTooLarge {
                len: encoded.len(),
                max: MAX_REQUEST_LEN,
            });
        }
        debug!("sending {} request ({} bytes)", message.command, encoded.len());
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Next request from the initiator. Late ACKs left over from the
    /// previous reply are skipped.
    pub async fn read_request(&mut self) -> Result<Request, LinkError> {
        loop {
            self.skip_acks();
            if !self.inbox.is_empty() && !ack::is_partial(&self.inbox) {
                break;
            }
            self.inbox.reserve(MAX_REQUEST_LEN);
            if self.stream.read_buf(&mut self.inbox).await? == 0 {
                return Ok(Request::Closed);
            }
        }
        let request = self.inbox.split();
        Ok(match Message::decode(&request) {
            Ok(message) => Request::Message(message),
            Err(err) => Request::Invalid(err),
        })
    }

    /// Pop whole ACK tokens off the front of the inbox.
    fn take_acks(&mut self, acks: &mut Vec<u32>) {
        while self.inbox.len() >= ACK_LEN {
            let Some(sequence) = ack::decode(&self.inbox[..ACK_LEN]) else {
                break;
            };
            self.inbox.advance(ACK_LEN);
            acks.push(sequence);
        }
    }

    fn skip_acks(&mut self) {
        let mut stale = Vec::new();
        self.take_acks(&mut stale);
        if !stale.is_empty() {
            debug!("skipping late ACKs {stale:?}");
        }
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<TransferStats, LinkError> {
        self.send_bytes(message.encode()).await
    }

    pub async fn recv_message(&mut self) -> Result<Message, LinkError> {
        let bytes = self.recv_bytes().await?;
        Ok(Message::decode(&bytes)?)
    }

    /// Deliver `payload` through the sliding window, retransmitting until
    /// every frame is acknowledged or `max_rounds` is reached.
    pub async fn send_bytes(&mut self, payload: Bytes) -> Result<TransferStats, LinkError> {
        let mut window = SendWindow::for_message(
            payload,
            self.config.payload_capacity(),
            self.config.window_size,
        )?;
        let mut stats = TransferStats {
            frames: window.len(),
            ..Default::default()
        };
        let mut wire = BytesMut::with_capacity(self.config.receive_buffer_size());
        self.skip_acks();

        while !window.is_complete() {
            if let Some(max) = self.config.max_rounds
                && stats.rounds >= max
            {
                return Err(LinkError::RetriesExhausted {
                    rounds: stats.rounds,
                    acked: window.base(),
                    total: window.len(),
                });
            }
            stats.rounds += 1;

            let first = window.base() + 1;
            let last = window.base() + window.in_flight().len();
            info!(
                "round {}: sending frames {first} to {last} of {}",
                stats.rounds,
                window.len()
            );
            wire.clear();
            let sent = window.transmit(&mut self.faults, &mut wire);
            self.stream.write_all(&wire).await?;
            self.stream.flush().await?;
            stats.frames_sent += sent.frames as u32;

            let Collected {
                acks,
                peer_moved_on,
            } = self.collect_acks(sent.frames).await?;
            stats.acks_observed += acks.len() as u32;

            let step = window.on_acks(&acks);
            if peer_moved_on && !window.is_complete() {
                let rest = window.acknowledge_all();
                info!(
                    "peer sent a new request, frames {} to {} count as delivered",
                    rest.from + 1,
                    rest.to
                );
            } else if acks.len() < sent.frames {
                stats.timeouts += 1;
            }

            if window.is_complete() {
                debug!("ACKs {acks:?}: window closed");
            } else if step.progressed() {
                debug!("ACKs {acks:?}: window base {} -> {}", step.from, step.to);
            } else {
                warn!(
                    "no progress in round {} (ACKs {acks:?}), resending from frame {first}",
                    stats.rounds
                );
            }

            if !window.is_complete() && self.config.inter_send_delay_ms > 0 {
                sleep(self.config.inter_send_delay()).await;
            }
        }

        info!(
            "delivered {} frames in {} rounds ({} transmissions)",
            stats.frames, stats.rounds, stats.frames_sent
        );
        Ok(stats)
    }

    /// Gather ACK tokens until one per transmitted frame has arrived, the
    /// peer sends something else, or the round deadline passes.
    async fn collect_acks(&mut self, expected: usize) -> Result<Collected, LinkError> {
        let deadline = Instant::now() + self.config.ack_timeout();
        let mut acks = Vec::with_capacity(expected);

        loop {
            self.take_acks(&mut acks);
            if !self.inbox.is_empty() && !ack::is_partial(&self.inbox) {
                debug!(
                    "{} bytes of new data after ACKs {acks:?}",
                    self.inbox.len()
                );
                return Ok(Collected {
                    acks,
                    peer_moved_on: true,
                });
            }
            if acks.len() >= expected {
                break;
            }

            self.inbox.reserve(MAX_REQUEST_LEN);
            match timeout_at(deadline, self.stream.read_buf(&mut self.inbox)).await {
                Err(_) => {
                    debug!(
                        "ACK timeout after {} of {expected} ACKs",
                        acks.len()
                    );
                    break;
                }
                Ok(Ok(0)) => return Err(LinkError::Closed),
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Err(err.into()),
            }
        }
        debug!("received ACKs {acks:?}");
        Ok(Collected {
            acks,
            peer_moved_on: false,
        })
    }

    /// Accept frames until the final one, acknowledging each frame observed.
    pub async fn recv_bytes(&mut self) -> Result<Bytes, LinkError> {
        let mut reassembler = Reassembler::new();
        let mut buf = vec![0u8; self.config.receive_buffer_size()];
        let mut acks = Vec::with_capacity(ACK_LEN * self.config.window_size);

        loop {
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(LinkError::Closed);
            }

            acks.clear();
            for block in split_frames(&buf[..n], self.config.frame_size) {
                let verdict = reassembler.on_block(block);
                let ack = reassembler.ack();
                match verdict {
                    Verdict::Accepted { sequence, .. } => debug!("frame {sequence} accepted"),
                    other => debug!("{other:?}, repeating ACK {ack}"),
                }
                if !self.faults.drop_ack(ack) {
                    acks.extend_from_slice(&ack::encode(ack));
                }
                if reassembler.is_complete() {
                    break;
                }
            }

            if !acks.is_empty() {
                self.stream.write_all(&acks).await?;
                self.stream.flush().await?;
            }
            if reassembler.is_complete() {
                info!(
                    "received message of {} frames",
                    reassembler.accepted_count()
                );
                return Ok(reassembler.into_bytes());
            }
        }
    }
}
