//! Scenario loading from YAML definition files. Scenario authoring
//! itself stays out of scope for the core; this is just the filesystem
//! glue the binary needs to hand one to a `SessionParams`.

use anyhow::{anyhow, Context, Result};
use persona_protocol::Scenario;
use std::path::Path;

/// Scan `dir` for a `*.yaml` file whose `id` field matches `scenario_id`.
pub fn load_scenario(dir: &Path, scenario_id: &str) -> Result<Scenario> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading scenario directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("reading scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing scenario file {}", path.display()))?;
        if scenario.id == scenario_id {
            return Ok(scenario);
        }
    }

    Err(anyhow!("scenario not found: {scenario_id}"))
}
