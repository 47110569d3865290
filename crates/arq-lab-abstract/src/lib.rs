pub mod ack;
pub mod checksum;
pub mod config;
pub mod consts;
pub mod envelope;
pub mod frame;
pub mod scenario;

pub use checksum::Checksum;
pub use config::{ConfigError, ConfigOverride, FaultConfig, ProtocolConfig};
pub use envelope::{Command, EnvelopeError, Message};
pub use frame::{Fragment, Frame, FrameError};
pub use scenario::{TestAction, TestAssertion, TestScenario};
