//! Wire constants shared by the sending and receiving roles.
//!
//! Both sides derive every frame boundary from these values; nothing here is
//! negotiated at runtime.

use std::time::Duration;

/// Physical size of one non-final frame on the wire.
pub const DEFAULT_FRAME_SIZE: usize = 1500;

/// Number of ASCII digits used for a sequence number (zero-padded).
pub const SEQ_WIDTH: usize = 5;

/// Size of the payload digest carried by every frame.
pub const CHECKSUM_LEN: usize = 16;

/// Sequence field followed by checksum field.
pub const HEADER_LEN: usize = SEQ_WIDTH + CHECKSUM_LEN;

/// Largest sequence number that fits in `SEQ_WIDTH` digits.
pub const MAX_SEQUENCE: u32 = 99_999;

/// Appended after the payload of the last frame of a message.
///
/// The leading `0xFF` never occurs in UTF-8 text, so an envelope fragment
/// cannot end with this marker by accident.
pub const END_MARKER: &[u8] = b"\xffEOM";

pub const ACK_PREFIX: &[u8] = b"ACK";

/// `ACK` followed by a zero-padded sequence number.
pub const ACK_LEN: usize = ACK_PREFIX.len() + SEQ_WIDTH;

/// Width of the command tag at the start of an envelope.
pub const TAG_LEN: usize = 4;

pub const DEFAULT_WINDOW_SIZE: usize = 4;

pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(50);

/// Largest encoded request the initiator may send. Requests are unframed,
/// so the responder reads at most this much for one request.
pub const MAX_REQUEST_LEN: usize = 16 * 1024;

pub const DEFAULT_PORT: u16 = 1234;

pub const DEFAULT_HOST: &str = "127.0.0.1";
