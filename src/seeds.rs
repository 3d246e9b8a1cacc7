//! Seed loading — case files discovered recursively under a directory.
//!
//! Every `*.json` file is parsed into a `CaseContext`. A file that cannot be
//! read or validated is reported in `SeedSet::failures` and the walk goes on.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use veritas_core::{CaseContext, Error};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct SeedFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct SeedSet {
    /// Cases in path order.
    pub cases: Vec<(PathBuf, CaseContext)>,
    pub failures: Vec<SeedFailure>,
}

impl SeedSet {
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// Walk `dir` and load every JSON case file beneath it. A missing directory
/// yields an empty set.
pub fn load_cases(dir: &Path) -> SeedSet {
    let mut seeds = SeedSet::default();
    if !dir.is_dir() {
        warn!("Seeds directory not found at {}", dir.display());
        return seeds;
    }

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                warn!("Failed to walk {}: {}", path.display(), e);
                seeds.failures.push(SeedFailure { path, error: Error::Io(e.into()) });
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_case(path) {
            Ok(case) => {
                debug!(case = %case.id, "loaded seed {}", path.display());
                seeds.cases.push((path.to_path_buf(), case));
            }
            Err(error) => {
                warn!("Failed to load seed {}: {}", path.display(), error);
                seeds.failures.push(SeedFailure { path: path.to_path_buf(), error });
            }
        }
    }

    info!("Loaded {} seed file(s), {} failed", seeds.cases.len(), seeds.failures.len());
    seeds
}

/// Parse one case file.
pub fn load_case(path: &Path) -> veritas_core::Result<CaseContext> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    CaseContext::from_value(value)
}
