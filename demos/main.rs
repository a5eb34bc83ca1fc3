use anyhow::Result;
use expect_def::Registry;
use std::process::ExitCode;

mod suite;

fn main() -> Result<ExitCode> {
    let mut registry = Registry::new();
    suite::register(&mut registry)?;
    expect_def::cli::run(registry)
}
