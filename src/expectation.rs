//! A registered test paired with its recorded output.
//!
//! An [`Expectation`] binds a zero-argument test function to the artifact
//! line it was declared on and to the expected-text block written at the top
//! of its body. [`Expectation::run`] executes the function under a capture
//! and compares the captured text with the block after [`normalize`].

use crate::capture;
use crate::error::{Error, Result};
use crate::rewrite::{block_indentation, FN_DEF};
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of calling a test function, before its output is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The function returned an error; the text is appended to the captured output.
    Failed(String),
}

/// Conversion from a test function's return value into an [`Outcome`].
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Completed
    }
}

impl<E: fmt::Debug> IntoOutcome for std::result::Result<(), E> {
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(()) => Outcome::Completed,
            Err(e) => Outcome::Failed(format!("Error: {e:?}")),
        }
    }
}

/// The callable stored for each expectation.
pub type TestFn = fn() -> Outcome;

/// Where an expectation was declared: the artifact and the 1-based line of
/// the registration annotation (not necessarily the `fn` line).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub artifact: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(artifact: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            artifact: artifact.into(),
            line,
        }
    }

    /// Resolve a `file!()` path reported by the compiler against the
    /// manifest directory of the crate that declared the expectation.
    ///
    /// Workspace members report `file!()` relative to the workspace root, so
    /// the manifest directory's ancestors are tried in turn.
    pub fn resolve(manifest_dir: &str, file: &str, line: u32) -> Self {
        let file = Path::new(file);
        let artifact = if file.is_absolute() {
            file.to_path_buf()
        } else {
            let manifest_dir = Path::new(manifest_dir);
            manifest_dir
                .ancestors()
                .map(|dir| dir.join(file))
                .find(|candidate| candidate.is_file())
                .unwrap_or_else(|| manifest_dir.join(file))
        };
        Self::new(artifact, line as usize)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.artifact.display(), self.line)
    }
}

#[derive(Debug, Clone)]
pub struct Expectation {
    callable: TestFn,
    location: Location,
    name: String,
    module: Option<String>,
    expected: Option<String>,
    actual: Option<String>,
    indentation: Option<String>,
}

impl Expectation {
    /// Create an expectation. `expected` is kept verbatim; normalisation only
    /// happens at comparison time.
    pub fn new(
        name: impl Into<String>,
        location: Location,
        expected: Option<&str>,
        callable: TestFn,
    ) -> Self {
        Self {
            callable,
            location,
            name: name.into(),
            module: None,
            expected: expected.map(str::to_string),
            actual: None,
            indentation: None,
        }
    }

    /// Record the module path the test function was defined in.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Declare the block indentation instead of deriving it from source.
    pub fn with_indentation(mut self, indentation: impl Into<String>) -> Self {
        self.indentation = Some(indentation.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn artifact(&self) -> &Path {
        &self.location.artifact
    }

    pub fn callable(&self) -> TestFn {
        self.callable
    }

    pub fn expected_text(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    /// Indentation given through [`Expectation::with_indentation`], if any.
    pub fn declared_indentation(&self) -> Option<&str> {
        self.indentation.as_deref()
    }

    /// Output of the latest run; `None` until [`Expectation::run`] is called.
    pub fn actual_text(&self) -> Option<&str> {
        self.actual.as_deref()
    }

    /// Run the test with stdout/stderr-flavoured output captured into one buffer.
    ///
    /// Panics and returned errors are captured as text, never propagated.
    /// Returns whether the normalised output equals the normalised expected text.
    pub fn run(&mut self) -> bool {
        let callable = self.callable;
        let output = capture::capture(|| {
            if let Outcome::Failed(message) = callable() {
                capture::write(capture::Stream::Stderr, format_args!("{message}\n"));
            }
        });

        let passed = normalize(Some(output.as_str())) == normalize(self.expected.as_deref());
        tracing::debug!(test = %self.name, location = %self.location, passed, "ran expectation");
        self.actual = Some(output);
        passed
    }

    /// Indentation of the expected-text block, read from the artifact on disk.
    pub fn indentation(&self) -> Result<Option<String>> {
        if let Some(declared) = &self.indentation {
            return Ok(Some(declared.clone()));
        }
        let artifact = self.artifact();
        let source = std::fs::read_to_string(artifact)
            .map_err(|e| Error::io("failed to read", artifact, e))?;
        Ok(self.indentation_in(&source))
    }

    /// Indentation of the expected-text block within `source`, for the first
    /// function definition at or below the declared line.
    ///
    /// A body that continues on the definition line is indented one level
    /// past it. Otherwise the line after the definition decides, and `None`
    /// is returned when no definition follows or that line is blank or missing.
    pub fn indentation_in(&self, source: &str) -> Option<String> {
        if let Some(declared) = &self.indentation {
            return Some(declared.clone());
        }
        let mut lines = source
            .lines()
            .skip(self.location.line.saturating_sub(1))
            .skip_while(|line| !FN_DEF.is_match(line));
        let definition = lines.next()?;
        block_indentation(definition, lines.next())
    }
}

/// Whitespace-insensitive canonical form used for comparisons.
///
/// Every line is trimmed, lines are joined with `\n`, and the result is
/// trimmed as a whole. `None` stays `None`.
pub fn normalize(text: Option<&str>) -> Option<String> {
    text.map(|text| {
        text.lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    })
}

pub(crate) fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn expectation(expected: Option<&str>, callable: TestFn) -> Expectation {
        Expectation::new("sample", Location::new("sample.rs", 1), expected, callable)
    }

    #[test]
    fn test_normalize_absent_stays_absent() {
        assert_eq!(normalize(None), None);
    }

    #[test]
    fn test_normalize_strips_indentation_and_blank_edges() {
        let text = "\n        a\n          b  \n\n        ";
        assert_eq!(normalize(Some(text)).as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_normalize_keeps_inner_blank_lines() {
        assert_eq!(normalize(Some("a\n\n  b\n")).as_deref(), Some("a\n\nb"));
    }

    #[test]
    fn test_run_passes_on_matching_output() {
        let mut e = expectation(Some("\n    a\n    b\n    "), || {
            crate::outln!("a");
            crate::outln!("b");
            Outcome::Completed
        });
        assert!(e.run());
        assert_eq!(e.actual_text(), Some("a\nb\n"));
    }

    #[test]
    fn test_run_fails_on_changed_character() {
        let mut e = expectation(Some("a\nb"), || {
            crate::outln!("a");
            crate::outln!("c");
            Outcome::Completed
        });
        assert!(!e.run());
        assert_eq!(e.actual_text(), Some("a\nc\n"));
    }

    #[test]
    fn test_run_without_expected_text_fails_even_when_silent() {
        let mut e = expectation(None, || Outcome::Completed);
        assert!(!e.run());
        assert_eq!(e.actual_text(), Some(""));
    }

    #[test]
    fn test_run_captures_returned_error() {
        let mut e = expectation(None, || {
            let parsed: std::result::Result<(), std::num::ParseIntError> =
                "x".parse::<i32>().map(|_| ());
            parsed.into_outcome()
        });
        e.run();
        assert_eq!(
            e.actual_text(),
            Some("Error: ParseIntError { kind: InvalidDigit }\n")
        );
    }

    #[test]
    fn test_run_captures_panic_and_can_expect_it() {
        let mut first = expectation(None, || panic!("boom"));
        assert!(!first.run());
        let trace = first.actual_text().unwrap().to_string();
        assert!(trace.trim_end().ends_with("boom"), "got {trace:?}");

        let mut second = expectation(Some(trace.as_str()), first.callable());
        assert!(second.run());
    }

    #[test]
    fn test_run_updates_actual_text_on_every_run() {
        let mut e = expectation(Some("x"), || {
            crate::out!("x");
            Outcome::Completed
        });
        assert!(e.run());
        assert!(e.run());
        assert_eq!(e.actual_text(), Some("x"));
    }

    #[test]
    fn test_indentation_from_line_after_definition() {
        let source = indoc! {r##"
            fn register(registry: &mut Registry) {
                registry.register(expect! {
                    #[allow(dead_code)]
                    fn first() {
                        r#"
                        a
                        "#;
                    }
                });
            }
        "##};
        let e = Expectation::new("first", Location::new("a.rs", 2), None, || Outcome::Completed);
        assert_eq!(e.indentation_in(source).as_deref(), Some("            "));
    }

    #[test]
    fn test_indentation_accepts_visibility_qualifier() {
        let source = "expect! {\n    pub(crate) fn shown() {\n\toutln!(\"x\");\n    }\n}\n";
        let e = Expectation::new("shown", Location::new("a.rs", 1), None, || Outcome::Completed);
        assert_eq!(e.indentation_in(source).as_deref(), Some("\t"));
    }

    #[test]
    fn test_indentation_unknown_without_definition() {
        let source = "let x = 1;\nlet y = 2;\n";
        let e = Expectation::new("none", Location::new("a.rs", 1), None, || Outcome::Completed);
        assert_eq!(e.indentation_in(source), None);
    }

    #[test]
    fn test_indentation_unknown_when_body_line_blank() {
        let source = "expect! {\n    fn gap() {\n\n        outln!(\"x\");\n    }\n}\n";
        let e = Expectation::new("gap", Location::new("a.rs", 1), None, || Outcome::Completed);
        assert_eq!(e.indentation_in(source), None);
    }

    #[test]
    fn test_indentation_of_single_line_definition() {
        let source = "fn register() {\n    let build = || expect! { fn one() { r#\"x\"#; outln!(\"x\"); } };\n}\n";
        let e = Expectation::new("one", Location::new("a.rs", 2), None, || Outcome::Completed);
        assert_eq!(e.indentation_in(source).as_deref(), Some("        "));

        let tabbed = "\tfn one() { outln!(\"x\"); }\n";
        let e = Expectation::new("one", Location::new("a.rs", 1), None, || Outcome::Completed);
        assert_eq!(e.indentation_in(tabbed).as_deref(), Some("\t\t"));
    }

    #[test]
    fn test_indentation_unknown_without_opening_brace() {
        let source = "expect! {\n    fn allman()\n    {\n        outln!(\"x\");\n    }\n}\n";
        let e = Expectation::new("allman", Location::new("a.rs", 1), None, || Outcome::Completed);
        assert_eq!(e.indentation_in(source), None);
    }

    #[test]
    fn test_declared_indentation_overrides_source() {
        let e = Expectation::new("x", Location::new("missing.rs", 1), None, || Outcome::Completed)
            .with_indentation("  ");
        assert_eq!(e.indentation().unwrap().as_deref(), Some("  "));
    }

    #[test]
    fn test_indentation_reports_missing_artifact() {
        let e = Expectation::new(
            "x",
            Location::new("/definitely/not/here.rs", 1),
            None,
            || Outcome::Completed,
        );
        assert!(e.indentation().unwrap_err().is_io());
    }

    #[test]
    fn test_resolve_finds_file_relative_to_manifest() {
        let location = Location::resolve(env!("CARGO_MANIFEST_DIR"), file!(), line!());
        assert!(location.artifact.is_file());
        assert!(location.artifact.ends_with("src/expectation.rs"));
    }
}
