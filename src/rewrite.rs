//! Regeneration of expected-text blocks inside an artifact.
//!
//! [`rewrite_source`] makes a single forward pass over the artifact. Lines are
//! copied byte-for-byte except where a declared expectation is found: from
//! its declared line the scan seeks the next function definition, emits a
//! fresh block holding the latest captured output right after the body's
//! opening brace, and then suppresses the string literal that opened the body
//! before. Any literal form is recognised (`"..."`, `r"..."`, `r#"..."#`,
//! `r##"..."##`, ...), inline or spanning lines.
//!
//! States, one per artifact, advanced once per line:
//!
//! - `Scanning`: copy the line; a declared line moves to `SeekingDefinition`,
//!   or is handled there directly when it is itself the `fn` line.
//! - `SeekingDefinition`: copy lines up to and including the next `fn` line,
//!   then write the new block. A body that continues on the `fn` line is
//!   split after its brace. Go to `SkipOldBlockOuter` if the expectation
//!   already had a block, else back to `Scanning`.
//! - `SkipOldBlockOuter`: copy blank and comment lines; the next line must
//!   open the old literal. An inline literal ends the skip, otherwise move to
//!   `SkipOldBlockInner`.
//! - `SkipOldBlockInner`: drop lines up to and including the one holding the
//!   literal's closing delimiter. Code following the delimiter is kept.
//!
//! A scan that ends in any state other than `Scanning` is an error, never a
//! truncated artifact.

use crate::error::{Error, Result};
use crate::expectation::{leading_whitespace, Expectation};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to an artifact path to name its corrected sibling.
pub const DEFAULT_CORRECTED_SUFFIX: &str = ".err";

/// The `fn` keyword, a name and the start of the parameter or generic list.
pub(crate) static FN_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfn\s+\w+\s*[(<]").unwrap());

/// A string literal opening at the start of the text, after whitespace.
static LITERAL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s*(?:r(#*))?""#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Literal {
    /// `r"..."`, `r#"..."#`, ... with its number of hashes.
    Raw(usize),
    /// `"..."` with escapes.
    Cooked,
}

/// The expectation whose old block is being skipped, and the indentation of
/// the block that replaced it.
#[derive(Debug)]
struct Replacement<'e> {
    expectation: &'e Expectation,
    indent: String,
}

#[derive(Debug)]
enum ScanState<'e> {
    Scanning,
    SeekingDefinition(&'e Expectation),
    SkipOldBlockOuter(Replacement<'e>),
    SkipOldBlockInner(Replacement<'e>, Literal),
}

/// `<artifact><suffix>`, e.g. `src/suite.rs.err`.
pub fn corrected_path(artifact: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(artifact.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// Write the corrected sibling of `artifact` and return its path.
///
/// Every expectation in `expectations` gets its block regenerated from its
/// latest output, passing or not. Nothing is written when the scan fails.
pub fn rewrite(artifact: &Path, expectations: &[Expectation], suffix: &str) -> Result<PathBuf> {
    let source =
        fs::read_to_string(artifact).map_err(|e| Error::io("failed to read", artifact, e))?;
    let corrected = rewrite_source(&source, expectations)?;

    let target = corrected_path(artifact, suffix);
    fs::write(&target, corrected).map_err(|e| Error::io("failed to write", &target, e))?;
    tracing::info!(
        artifact = %artifact.display(),
        corrected = %target.display(),
        expectations = expectations.len(),
        "wrote corrected artifact"
    );
    Ok(target)
}

/// Regenerate every expectation's block within `source`.
pub fn rewrite_source(source: &str, expectations: &[Expectation]) -> Result<String> {
    // Declared lines are 1-based; the scan below is 0-based.
    let by_line: BTreeMap<usize, &Expectation> = expectations
        .iter()
        .map(|e| (e.location().line.saturating_sub(1), e))
        .collect();
    let mut pending: BTreeSet<usize> = by_line.keys().copied().collect();

    let mut out = String::with_capacity(source.len());
    let mut state = ScanState::Scanning;
    let mut lines = source.split_inclusive('\n').enumerate().peekable();

    while let Some((index, line)) = lines.next() {
        let next = lines.peek().map(|&(_, next)| next);
        state = match state {
            ScanState::Scanning => match by_line.get(&index) {
                Some(&expectation) => {
                    pending.remove(&index);
                    if FN_DEF.is_match(line) {
                        open_definition(&mut out, line, next, expectation)?
                    } else {
                        out.push_str(line);
                        ScanState::SeekingDefinition(expectation)
                    }
                }
                None => {
                    out.push_str(line);
                    ScanState::Scanning
                }
            },
            ScanState::SeekingDefinition(expectation) => {
                if FN_DEF.is_match(line) {
                    open_definition(&mut out, line, next, expectation)?
                } else {
                    out.push_str(line);
                    ScanState::SeekingDefinition(expectation)
                }
            }
            ScanState::SkipOldBlockOuter(replacement) => {
                if is_blank_or_comment(line) {
                    out.push_str(line);
                    ScanState::SkipOldBlockOuter(replacement)
                } else {
                    skip_block_start(&mut out, line, replacement)?
                }
            }
            ScanState::SkipOldBlockInner(replacement, literal) => {
                match literal_close(line, literal) {
                    Some(end) => finish_block(&mut out, &line[end..], &replacement),
                    None => ScanState::SkipOldBlockInner(replacement, literal),
                }
            }
        };
    }

    match state {
        ScanState::Scanning => {}
        ScanState::SeekingDefinition(expectation) => {
            return Err(Error::DefinitionNotFound {
                artifact: expectation.artifact().to_path_buf(),
                line: expectation.location().line,
            });
        }
        ScanState::SkipOldBlockOuter(replacement) => {
            return Err(malformed(
                replacement.expectation,
                "the artifact ends before the expected-text block",
            ));
        }
        ScanState::SkipOldBlockInner(replacement, _) => {
            return Err(malformed(
                replacement.expectation,
                "the artifact ends inside the expected-text block",
            ));
        }
    }

    if let Some(index) = pending.first() {
        let expectation = by_line[index];
        return Err(Error::DefinitionNotFound {
            artifact: expectation.artifact().to_path_buf(),
            line: expectation.location().line,
        });
    }

    Ok(out)
}

/// Copy the definition line, write the regenerated block after the body's
/// opening brace and pick the state that handles the old block.
fn open_definition<'e>(
    out: &mut String,
    line: &str,
    next: Option<&str>,
    expectation: &'e Expectation,
) -> Result<ScanState<'e>> {
    let indent = match expectation.declared_indentation() {
        Some(declared) => declared.to_string(),
        None => block_indentation(line, next).ok_or_else(|| Error::IndentationUnknown {
            artifact: expectation.artifact().to_path_buf(),
            line: expectation.location().line,
        })?,
    };
    let eol = line_ending(line);
    let actual = expectation.actual_text().unwrap_or_default();
    let replacement = Replacement {
        expectation,
        indent,
    };

    match body_tail(line).filter(|tail| !is_blank_or_comment(tail)) {
        Some(tail) => {
            out.push_str(line[..line.len() - tail.len()].trim_end());
            out.push_str(eol);
            emit_block(out, &replacement.indent, actual, eol);
            if expectation.expected_text().is_some() {
                skip_block_start(out, tail, replacement)
            } else {
                emit_remainder(out, tail, &replacement.indent);
                Ok(ScanState::Scanning)
            }
        }
        None => {
            out.push_str(line);
            if !line.ends_with('\n') {
                out.push_str(eol);
            }
            emit_block(out, &replacement.indent, actual, eol);
            Ok(if expectation.expected_text().is_some() {
                ScanState::SkipOldBlockOuter(replacement)
            } else {
                ScanState::Scanning
            })
        }
    }
}

/// Consume the opening of the old literal from `text`.
fn skip_block_start<'e>(
    out: &mut String,
    text: &str,
    replacement: Replacement<'e>,
) -> Result<ScanState<'e>> {
    let Some((literal, start)) = literal_open(text) else {
        return Err(malformed(
            replacement.expectation,
            "the function body does not open with a string literal",
        ));
    };
    let rest = &text[start..];
    Ok(match literal_close(rest, literal) {
        Some(end) => finish_block(out, &rest[end..], &replacement),
        None => ScanState::SkipOldBlockInner(replacement, literal),
    })
}

/// Keep whatever followed the old literal's closing delimiter and `;`.
fn finish_block<'e>(out: &mut String, rest: &str, replacement: &Replacement<'_>) -> ScanState<'e> {
    let rest = rest.trim_start();
    emit_remainder(out, rest.strip_prefix(';').unwrap_or(rest), &replacement.indent);
    ScanState::Scanning
}

fn emit_remainder(out: &mut String, rest: &str, indent: &str) {
    if rest.trim().is_empty() {
        return;
    }
    out.push_str(indent);
    out.push_str(rest.trim_start());
}

fn malformed(expectation: &Expectation, reason: &'static str) -> Error {
    Error::MalformedBlock {
        artifact: expectation.artifact().to_path_buf(),
        line: expectation.location().line,
        reason,
    }
}

fn is_blank_or_comment(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.starts_with("//")
}

/// Text after the opening brace of the body defined on `definition`.
fn body_tail(definition: &str) -> Option<&str> {
    let signature = FN_DEF.find(definition)?;
    let brace = signature.end() + definition[signature.end()..].find('{')?;
    Some(&definition[brace + 1..])
}

/// Indentation of the block for the function defined on `definition`.
///
/// A body continuing on the definition line is indented one level deeper
/// than that line; otherwise the block takes the indentation of the next
/// line. `None` when the definition has no opening brace or the next line is
/// blank or missing.
pub(crate) fn block_indentation(definition: &str, next: Option<&str>) -> Option<String> {
    let tail = body_tail(definition)?;
    if !is_blank_or_comment(tail) {
        let base = leading_whitespace(definition);
        let unit = if base.contains('\t') { "\t" } else { "    " };
        return Some(format!("{base}{unit}"));
    }
    next.filter(|line| !line.trim().is_empty())
        .map(|line| leading_whitespace(line).to_string())
}

/// The literal opening `text` and the offset just past its opening quote.
fn literal_open(text: &str) -> Option<(Literal, usize)> {
    let captures = LITERAL_OPEN.captures(text)?;
    let literal = match captures.get(1) {
        Some(hashes) => Literal::Raw(hashes.len()),
        None => Literal::Cooked,
    };
    Some((literal, captures.get(0)?.end()))
}

/// Offset just past the closing delimiter of `literal` within `text`, which
/// starts inside the literal.
fn literal_close(text: &str, literal: Literal) -> Option<usize> {
    match literal {
        Literal::Raw(hashes) => {
            let closing = format!("\"{}", "#".repeat(hashes));
            text.find(&closing).map(|at| at + closing.len())
        }
        Literal::Cooked => {
            let mut escaped = false;
            for (at, c) in text.char_indices() {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => return Some(at + 1),
                    _ => {}
                }
            }
            None
        }
    }
}

fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Fewest hashes that let `text` sit inside a raw string literal.
fn raw_hashes(text: &str) -> usize {
    text.match_indices('"')
        .map(|(at, _)| text[at + 1..].chars().take_while(|&c| c == '#').count())
        .max()
        .map_or(1, |longest| longest + 1)
}

fn emit_block(out: &mut String, indent: &str, actual: &str, eol: &str) {
    let hashes = "#".repeat(raw_hashes(actual));
    out.push_str(indent);
    out.push('r');
    out.push_str(&hashes);
    out.push('"');
    out.push_str(eol);
    for line in actual.lines() {
        if !line.trim().is_empty() {
            out.push_str(indent);
            out.push_str(line);
        }
        out.push_str(eol);
    }
    out.push_str(indent);
    out.push('"');
    out.push_str(&hashes);
    out.push(';');
    out.push_str(eol);
}

/// Text of the expected-text block attached to the expectation declared on
/// `line` (1-based), as the compiler sees the literal.
///
/// `None` when no function definition follows the line or its body does not
/// open with a string literal.
pub fn read_block(source: &str, line: usize) -> Option<String> {
    let offset: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let rest = &source[offset..];

    let definition = FN_DEF.find(rest)?;
    let body = body_tail(&rest[definition.start()..])?;
    let (literal, start) = literal_open(body)?;
    let contents = &body[start..];
    let end = literal_close(contents, literal)?;

    Some(match literal {
        Literal::Raw(hashes) => contents[..end - 1 - hashes].to_string(),
        Literal::Cooked => unescape(&contents[..end - 1]),
    })
}

/// Resolve the escapes of a non-raw string literal's contents.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            // Line continuation skips the newline and the next line's indentation.
            Some('\n') | Some('\r') => while chars.next_if(|c| c.is_whitespace()).is_some() {},
            Some('x') => {
                let code: String = chars.by_ref().take(2).collect();
                if let Ok(byte) = u8::from_str_radix(&code, 16) {
                    out.push(char::from(byte));
                }
            }
            Some('u') => {
                let code: String = chars.by_ref().skip(1).take_while(|&c| c != '}').collect();
                if let Some(c) = u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Promote the corrected sibling of `artifact` over the original.
///
/// The rename replaces the original in one step. Returns `false`, touching
/// nothing, when no corrected sibling exists.
pub fn accept(artifact: &Path, suffix: &str) -> Result<bool> {
    let corrected = corrected_path(artifact, suffix);
    if !corrected.is_file() {
        return Ok(false);
    }
    fs::rename(&corrected, artifact).map_err(|e| Error::io("failed to replace", artifact, e))?;
    tracing::info!(artifact = %artifact.display(), "accepted corrected artifact");
    Ok(true)
}
