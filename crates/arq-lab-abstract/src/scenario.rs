use crate::config::ConfigOverride;
use crate::envelope::Command;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: ConfigOverride,
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Transfer one message. `data` is repeated `repeat` times to build large bodies.
    Send {
        command: Command,
        data: String,
        #[serde(default)]
        repeat: Option<usize>,
    },
    /// Corrupt the checksum of the next transmission of frame `seq`
    CorruptNextSeq { seq: u32 },
    /// Drop the next ACK carrying `ack`
    DropNextAck { ack: u32 },
}

impl TestAction {
    /// Body of a `Send` action with repetition applied.
    pub fn body(&self) -> Option<String> {
        match self {
            TestAction::Send { data, repeat, .. } => Some(data.repeat(repeat.unwrap_or(1))),
            _ => None,
        }
    }
}

/// Checked against the transfer at `transfer` (0-based), or the first one when omitted.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Every sent message was delivered intact, in order
    Delivered,
    /// Number of transmission rounds is within range
    Rounds {
        #[serde(default)]
        transfer: usize,
        min: u32,
        max: Option<u32>,
    },
    /// Total frames written (including retransmissions) is within range
    FramesSent {
        #[serde(default)]
        transfer: usize,
        min: u32,
        max: Option<u32>,
    },
    /// Window base after each round, starting with the initial 0
    BaseTrace {
        #[serde(default)]
        transfer: usize,
        expected: Vec<usize>,
    },
    /// Every transfer finished
    Completed,
    /// Some transfer hit the round cap without finishing
    Stalled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_scenario() {
        let scenario: TestScenario = toml::from_str(
            r#"
name = "two rounds"
description = "six frames, window four"

[config]
frame_size = 64
window_size = 4

[[actions]]
type = "corrupt_next_seq"
seq = 2

[[actions]]
type = "send"
command = "CHAT"
data = "x"
repeat = 10

[[assertions]]
type = "rounds"
min = 2
max = 3

[[assertions]]
type = "delivered"
"#,
        )
        .unwrap();

        assert_eq!(scenario.config.window_size, Some(4));
        assert_eq!(scenario.actions.len(), 2);
        assert_eq!(scenario.actions[1].body().as_deref(), Some("xxxxxxxxxx"));
        assert!(matches!(
            scenario.actions[1],
            TestAction::Send {
                command: Command::Chat,
                ..
            }
        ));
        assert!(matches!(
            scenario.assertions[0],
            TestAssertion::Rounds {
                transfer: 0,
                min: 2,
                max: Some(3)
            }
        ));
    }
}
