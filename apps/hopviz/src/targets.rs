use anyhow::{anyhow, Result};
use std::fs;
use std::path::Path;

/// Traced when no destinations are given.
pub const DEFAULT_DESTINATIONS: [&str; 3] = ["google.com", "amazon.com", "bbc.co.uk"];

/// One destination per line; blank lines and `#` comments are skipped.
pub fn parse_targets(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn resolve_targets(file: Option<&Path>, listed: Vec<String>) -> Result<Vec<String>> {
    let mut targets = Vec::new();

    if let Some(path) = file {
        let contents = fs::read_to_string(path)
            .map_err(|err| anyhow!("failed to read targets file {:?}: {}", path, err))?;
        targets.extend(parse_targets(&contents));
    }

    targets.extend(listed);
    Ok(targets)
}
