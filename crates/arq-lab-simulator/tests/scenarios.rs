//! Runs every scenario shipped in the workspace `scenarios/` directory.

use std::path::PathBuf;

use arq_lab_simulator::scenario_runner;

fn scenario_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../scenarios"))
}

#[test]
fn bundled_scenarios_pass() {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(scenario_dir())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();
    assert!(!paths.is_empty());

    for path in paths {
        let report = scenario_runner::run_scenario(path.to_str().unwrap())
            .unwrap_or_else(|err| panic!("{}: {err:#}", path.display()));
        assert!(!report.transfers.is_empty(), "{}", path.display());
    }
}
