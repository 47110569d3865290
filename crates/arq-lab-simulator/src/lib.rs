pub mod engine;
pub mod scenario_runner;
pub mod trace;

pub use engine::{DEFAULT_ROUND_CAP, Simulator};
pub use trace::{Outcome, SimulationReport, TransferReport};
