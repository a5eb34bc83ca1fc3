//! Self-hosted suite exercising the harness end to end.

use expect_def::{expect, outln, Registry, Result};

/// Forwards its tokens to `expect!`; the expectation is keyed on this
/// macro's invocation line.
macro_rules! passthrough {
    ($($item:tt)*) => {
        expect! { $($item)* }
    };
}

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register(expect! {
        fn first_test() {
            r#"
            a
            b
            b
            b
            b
            c
            "#;
            outln!("a");
            for _ in 0..4 {
                outln!("b");
            }
            outln!("c");
        }
    })?;

    registry.register(passthrough! {
        fn with_forwarding_macro() {
            r#"
            hi there!
            "#;
            outln!("hi there!");
        }
    })?;

    Ok(())
}
