use expect_def::{expect, outln, read_block, rewrite_source, Error, Registry};
use pretty_assertions::assert_eq;

macro_rules! passthrough {
    ($($item:tt)*) => {
        expect! { $($item)* }
    };
}

#[test]
fn test_expectation_is_keyed_on_the_macro_line() {
    let at = line!() as usize + 1;
    let mut expectation = expect! {
        fn greets() {
            r#"
            hello
            "#;
            outln!("hello");
        }
    };

    assert_eq!(expectation.name(), "greets");
    assert_eq!(expectation.location().line, at);
    assert!(expectation.artifact().ends_with("tests/macro_registration_test.rs"));
    assert!(expectation.artifact().is_file());
    assert_eq!(expectation.module(), Some(module_path!()));
    assert!(expectation.run());
}

#[test]
fn test_forwarding_macro_keys_on_its_own_line() {
    let at = line!() as usize + 1;
    let mut expectation = passthrough! {
        fn wrapped() {
            r#"
            hi there!
            "#;
            outln!("hi there!");
        }
    };

    assert_eq!(expectation.location().line, at);
    assert!(expectation.run());

    let source = std::fs::read_to_string(expectation.artifact()).unwrap();
    assert_eq!(
        read_block(&source, at).as_deref(),
        expectation.expected_text()
    );
    assert_eq!(expectation.indentation().unwrap().as_deref(), Some("            "));
}

#[test]
fn test_missing_block_regenerates_from_output() {
    let at = line!() as usize + 1;
    let mut expectation = expect! {
        #[allow(clippy::needless_return)]
        fn undocumented() {
            outln!("first");
            outln!("second");
            return;
        }
    };
    assert_eq!(expectation.expected_text(), None);
    assert!(!expectation.run());

    let source = std::fs::read_to_string(expectation.artifact()).unwrap();
    let corrected = rewrite_source(&source, std::slice::from_ref(&expectation)).unwrap();
    assert_eq!(
        read_block(&corrected, at).as_deref(),
        Some("\n            first\n            second\n            ")
    );
    assert_eq!(corrected.lines().count(), source.lines().count() + 4);
}

#[test]
fn test_returned_error_becomes_output() {
    let mut expectation = expect! {
        fn fails() -> Result<(), String> {
            r#"
            partial
            Error: "bad input"
            "#;
            outln!("partial");
            Err("bad input".to_string())
        }
    };
    assert!(expectation.run(), "got {:?}", expectation.actual_text());
}

#[test]
fn test_panic_is_captured_not_propagated() {
    let mut expectation = expect! {
        fn explodes() {
            outln!("before");
            panic!("kaboom");
        }
    };
    assert!(!expectation.run());

    let actual = expectation.actual_text().unwrap();
    assert!(actual.starts_with("before\npanicked at "), "got {actual:?}");
    assert!(actual.ends_with("kaboom\n"), "got {actual:?}");
}

#[test]
fn test_registry_rejects_second_expectation_on_one_line() {
    let mut registry = Registry::new();
    let build = || expect! { fn twice() { r#"x"#; outln!("x"); } };

    let callable = registry.register(build()).unwrap();
    assert_eq!(callable(), expect_def::Outcome::Completed);

    let err = registry.register(build()).unwrap_err();
    assert!(matches!(err, Error::DuplicateLocation { .. }));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_single_line_definition_is_split_on_rewrite() {
    let at = line!() as usize + 1;
    let mut expectation = expect! { fn one_liner() { r#"stale"#; outln!("fresh"); } };
    assert!(!expectation.run());

    let source = std::fs::read_to_string(expectation.artifact()).unwrap();
    let corrected = rewrite_source(&source, std::slice::from_ref(&expectation)).unwrap();

    assert_eq!(read_block(&corrected, at).as_deref(), Some("\n        fresh\n        "));
    assert_eq!(corrected.lines().count(), source.lines().count() + 4);
    assert_eq!(corrected.lines().last(), source.lines().last());
}
