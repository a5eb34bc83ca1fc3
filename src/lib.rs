//! Output-snapshot tests whose expected text lives in the test function itself.
//!
//! A test is declared with [`expect!`]: the raw string literal that opens the
//! function body is the recorded output. Running the test captures what it
//! writes through [`outln!`] and friends and compares the two after
//! whitespace normalisation. When an artifact fails, a corrected sibling
//! (`<file>.err`) is written with every block replaced by the latest output,
//! ready to be reviewed and accepted.
//!
//! ```ignore
//! use expect_def::{expect, outln, Registry};
//!
//! pub fn register(registry: &mut Registry) -> expect_def::Result<()> {
//!     registry.register(expect! {
//!         fn greets() {
//!             r#"
//!             hello
//!             "#;
//!             outln!("hello");
//!         }
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod expectation;
mod macros;
pub mod registry;
pub mod report;
pub mod rewrite;
pub mod runner;

pub use crate::capture::{error_output, output, CaptureGuard};
pub use crate::config::{load_config, DiffConfig, HarnessConfig};
pub use crate::error::{Error, Result};
pub use crate::expectation::{normalize, Expectation, IntoOutcome, Location, Outcome, TestFn};
pub use crate::registry::Registry;
pub use crate::report::{Reporter, TerminalReporter};
pub use crate::rewrite::{accept, corrected_path, read_block, rewrite, rewrite_source};
pub use crate::runner::{run_all, RunSummary};
