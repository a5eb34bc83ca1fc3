/// Declare a test whose expected output is the raw string literal opening its body.
///
/// The macro defines the function and evaluates to an [`Expectation`](crate::Expectation)
/// keyed on the line of the outermost macro invocation. A wrapper macro that forwards
/// its tokens to `expect!` therefore keys the expectation on its own line.
///
/// ```ignore
/// registry.register(expect! {
///     fn greets() {
///         r#"
///         hello
///         "#;
///         outln!("hello");
///     }
/// })?;
/// ```
///
/// A body that does not open with a literal declares no expectation yet; the first
/// failing run regenerates one. Functions may return `Result<(), E>` with `E: Debug`.
#[macro_export]
macro_rules! expect {
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident () $(-> $ret:ty)? {
            $expected:literal ;
            $($body:tt)*
        }
    ) => {{
        $(#[$meta])*
        $vis fn $name() $(-> $ret)? {
            let _ = $expected;
            $($body)*
        }
        $crate::Expectation::new(
            stringify!($name),
            $crate::Location::resolve(env!("CARGO_MANIFEST_DIR"), file!(), line!()),
            Some($expected),
            || $crate::IntoOutcome::into_outcome($name()),
        )
        .with_module(module_path!())
    }};
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident () $(-> $ret:ty)? {
            $($body:tt)*
        }
    ) => {{
        $(#[$meta])*
        $vis fn $name() $(-> $ret)? {
            $($body)*
        }
        $crate::Expectation::new(
            stringify!($name),
            $crate::Location::resolve(env!("CARGO_MANIFEST_DIR"), file!(), line!()),
            None,
            || $crate::IntoOutcome::into_outcome($name()),
        )
        .with_module(module_path!())
    }};
}

/// Capture-aware `print!`.
#[macro_export]
macro_rules! out {
    ($($arg:tt)*) => {
        $crate::capture::write($crate::capture::Stream::Stdout, format_args!($($arg)*))
    };
}

/// Capture-aware `println!`.
#[macro_export]
macro_rules! outln {
    () => {
        $crate::capture::write($crate::capture::Stream::Stdout, format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::capture::write(
            $crate::capture::Stream::Stdout,
            format_args!("{}\n", format_args!($($arg)*)),
        )
    };
}

/// Capture-aware `eprint!`.
#[macro_export]
macro_rules! eout {
    ($($arg:tt)*) => {
        $crate::capture::write($crate::capture::Stream::Stderr, format_args!($($arg)*))
    };
}

/// Capture-aware `eprintln!`.
#[macro_export]
macro_rules! eoutln {
    () => {
        $crate::capture::write($crate::capture::Stream::Stderr, format_args!("\n"))
    };
    ($($arg:tt)*) => {
        $crate::capture::write(
            $crate::capture::Stream::Stderr,
            format_args!("{}\n", format_args!($($arg)*)),
        )
    };
}
