//! Reliability layer: fault injection, the sender's sliding window, the
//! receiver's in-order reassembler, and an async link that drives both over a
//! byte stream.

pub mod fault;
pub mod link;
pub mod reassembler;
pub mod window;

pub use fault::FaultInjector;
pub use link::{Link, LinkError, Request, TransferStats};
pub use reassembler::{Reassembler, Verdict};
pub use window::{Advance, SendWindow, Transmission};

pub use arq_lab_abstract::{Command, Message, ProtocolConfig};
