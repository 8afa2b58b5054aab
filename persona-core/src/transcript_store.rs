//! Persists a finished call's transcript to disk as pretty-printed JSON.

use persona_protocol::Transcript;
use std::io;
use std::path::{Path, PathBuf};

/// Write `transcript` as pretty JSON to `dir/<scenario_id>_<timestamp>.json`
/// and return the path written. Callers decide whether to call this at all
/// (the spec'd rule is: only when `transcript.turn_count > 0`).
pub fn save_transcript(
    transcript: &Transcript,
    dir: &Path,
    timestamp: &str,
) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let filename = format!("{}_{}.json", transcript.scenario_id, timestamp);
    let path = dir.join(filename);
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, transcript)?;
    Ok(path)
}
