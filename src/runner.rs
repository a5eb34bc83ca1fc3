//! Sequential execution of every registered expectation.

use crate::error::{Error, Result};
use crate::expectation::Expectation;
use crate::registry::Registry;
use crate::rewrite::corrected_path;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-artifact pass/fail outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    results: BTreeMap<PathBuf, bool>,
}

impl RunSummary {
    pub fn passed(&self, artifact: &Path) -> Option<bool> {
        self.results.get(artifact).copied()
    }

    pub fn all_passed(&self) -> bool {
        self.results.values().all(|passed| *passed)
    }

    /// Artifacts with at least one failing expectation, in path order.
    pub fn failed(&self) -> impl Iterator<Item = &Path> {
        self.results
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(artifact, _)| artifact.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, bool)> {
        self.results
            .iter()
            .map(|(artifact, passed)| (artifact.as_path(), *passed))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Run every expectation of one artifact.
///
/// Never short-circuits: a failure still lets the remaining expectations run,
/// so all of their blocks can be regenerated in one pass.
pub fn run_artifact(expectations: &mut [Expectation]) -> bool {
    expectations
        .iter_mut()
        .fold(true, |all_passed, expectation| expectation.run() && all_passed)
}

/// Run every artifact in the registry and record whether each one passed.
pub fn run_all(registry: &mut Registry) -> RunSummary {
    let results = registry
        .iter_mut()
        .map(|(artifact, expectations)| {
            let _span = tracing::info_span!("artifact", path = %artifact.display()).entered();
            let passed = run_artifact(expectations);
            tracing::info!(expectations = expectations.len(), passed, "ran artifact");
            (artifact.to_path_buf(), passed)
        })
        .collect();
    RunSummary { results }
}

/// Get `artifact` ready for a run by removing a corrected sibling left over
/// from an earlier one.
///
/// Returns whether a file was removed.
pub fn prepare(artifact: &Path, suffix: &str) -> Result<bool> {
    let corrected = corrected_path(artifact, suffix);
    match std::fs::remove_file(&corrected) {
        Ok(()) => {
            tracing::debug!(path = %corrected.display(), "removed stale corrected file");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io("failed to remove", &corrected, e)),
    }
}
