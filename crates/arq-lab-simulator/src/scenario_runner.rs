use anyhow::{Context, anyhow, bail};
use std::fs;
use tracing::info;

use arq_lab_abstract::{Message, ProtocolConfig, TestAction, TestAssertion, TestScenario};

use crate::engine::Simulator;
use crate::trace::{Outcome, SimulationReport, TransferReport};

pub fn load_scenario(scenario_path: &str) -> anyhow::Result<TestScenario> {
    let content = fs::read_to_string(scenario_path)
        .with_context(|| format!("Failed to read scenario file {scenario_path}"))?;
    toml::from_str(&content).context("Failed to parse scenario")
}

pub fn run_scenario(scenario_path: &str) -> anyhow::Result<SimulationReport> {
    run(&load_scenario(scenario_path)?)
}

/// Play the scenario's actions in order, then check every assertion.
pub fn run(scenario: &TestScenario) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut config = ProtocolConfig::default();
    scenario.config.apply_to(&mut config);
    config.validate().context("Invalid scenario config")?;

    let mut sim = Simulator::new(config);
    let mut sent = Vec::new();
    for action in &scenario.actions {
        match action {
            TestAction::Send { command, .. } => {
                let message = Message::new(*command, action.body().unwrap_or_default());
                sim.transfer(&message)
                    .with_context(|| format!("Cannot frame {command} message"))?;
                sent.push(message);
            }
            TestAction::CorruptNextSeq { seq } => sim.add_corrupt_seq_once(*seq),
            TestAction::DropNextAck { ack } => sim.add_drop_ack_once(*ack),
        }
    }

    let report = sim.export_report();
    for assertion in &scenario.assertions {
        check(assertion, &report, &sent)?;
    }

    info!("Test Scenario Passed!");
    Ok(report)
}

fn transfer(report: &SimulationReport, index: usize) -> anyhow::Result<&TransferReport> {
    report.transfers.get(index).ok_or_else(|| {
        anyhow!(
            "Assertion refers to transfer {index}, but only {} ran",
            report.transfers.len()
        )
    })
}

fn check_range(what: &str, actual: u32, min: u32, max: Option<u32>) -> anyhow::Result<()> {
    if actual < min {
        bail!("Assertion Failed: {what} was {actual}, expected min {min}");
    }
    if let Some(max) = max
        && actual > max
    {
        bail!("Assertion Failed: {what} was {actual}, expected max {max}");
    }
    Ok(())
}

fn check(
    assertion: &TestAssertion,
    report: &SimulationReport,
    sent: &[Message],
) -> anyhow::Result<()> {
    match assertion {
        TestAssertion::Delivered => {
            if report.delivered != sent {
                bail!(
                    "Assertion Failed: delivered {} of {} messages intact and in order",
                    report
                        .delivered
                        .iter()
                        .zip(sent)
                        .take_while(|(got, want)| got == want)
                        .count(),
                    sent.len()
                );
            }
        }
        TestAssertion::Rounds { transfer: t, min, max } => {
            check_range("Rounds", transfer(report, *t)?.rounds, *min, *max)?;
        }
        TestAssertion::FramesSent { transfer: t, min, max } => {
            check_range("Frames sent", transfer(report, *t)?.frames_sent, *min, *max)?;
        }
        TestAssertion::BaseTrace { transfer: t, expected } => {
            let actual = &transfer(report, *t)?.base_trace;
            if actual != expected {
                bail!("Assertion Failed: base trace {actual:?}, expected {expected:?}");
            }
        }
        TestAssertion::Completed => {
            if let Some((i, _)) = report
                .transfers
                .iter()
                .enumerate()
                .find(|(_, t)| t.outcome != Outcome::Completed)
            {
                bail!("Assertion Failed: transfer {i} did not complete");
            }
        }
        TestAssertion::Stalled => {
            if !report.transfers.iter().any(|t| t.outcome == Outcome::Stalled) {
                bail!("Assertion Failed: expected a stalled transfer, all completed");
            }
        }
    }
    Ok(())
}
