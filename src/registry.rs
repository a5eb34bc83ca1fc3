//! Artifact-keyed collection of expectations.
//!
//! The registry is built by the test entry point (one `register` function per
//! suite module, called before any run) and handed by reference to the runner
//! and the rewriter. It is append-only while suites register and read-only
//! afterwards, apart from each expectation's latest output.

use crate::error::{Error, Result};
use crate::expectation::{Expectation, TestFn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct Registry {
    artifacts: BTreeMap<PathBuf, Vec<Expectation>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an expectation under its artifact and hand back its callable.
    ///
    /// Expectations keep registration order within an artifact. A second
    /// expectation on an already-used artifact line is rejected, since the
    /// rewriter keys blocks by line alone.
    pub fn register(&mut self, expectation: Expectation) -> Result<TestFn> {
        let expectations = self
            .artifacts
            .entry(expectation.artifact().to_path_buf())
            .or_default();

        if let Some(existing) = expectations
            .iter()
            .find(|e| e.location().line == expectation.location().line)
        {
            return Err(Error::DuplicateLocation {
                artifact: expectation.artifact().to_path_buf(),
                line: expectation.location().line,
                name: expectation.name().to_string(),
                existing: existing.name().to_string(),
            });
        }

        tracing::debug!(
            test = expectation.name(),
            location = %expectation.location(),
            "registered expectation"
        );
        let callable = expectation.callable();
        expectations.push(expectation);
        Ok(callable)
    }

    /// Artifacts in path order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        self.artifacts.keys().map(PathBuf::as_path)
    }

    /// Expectations registered for `artifact`, in registration order.
    pub fn expectations(&self, artifact: &Path) -> &[Expectation] {
        self.artifacts
            .get(artifact)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[Expectation])> {
        self.artifacts
            .iter()
            .map(|(artifact, expectations)| (artifact.as_path(), expectations.as_slice()))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&Path, &mut [Expectation])> {
        self.artifacts
            .iter_mut()
            .map(|(artifact, expectations)| (artifact.as_path(), expectations.as_mut_slice()))
    }

    /// Total number of expectations across all artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
