// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Testing helper macros.

/// Assert that an expression matches a pattern.
///
/// # Example
///
/// ```
/// use lodestar_macros::assert_matches;
///
/// #[derive(Debug)]
/// enum Storage { Register(u32), Slot(u32) }
///
/// assert_matches!(Storage::Register(4), Storage::Register(n) if n < 8);
/// ```
#[macro_export]
macro_rules! assert_matches {
    ($expr:expr, $pat:pat $(if $guard:expr)? $(,)?) => {
        match $expr {
            $pat $(if $guard)? => {}
            ref e => panic!(
                "assertion failed: `{}` does not match pattern `{}`\n  value: {:?}",
                stringify!($expr),
                stringify!($pat $(if $guard)?),
                e
            ),
        }
    };
}

/// Assert that a Result is Ok and extract the value.
///
/// # Example
///
/// ```
/// use lodestar_macros::assert_ok;
///
/// let value = assert_ok!("42".parse::<u32>());
/// assert_eq!(value, 42);
/// ```
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!(
                "assertion failed: expected Ok, got Err\n  expression: `{}`\n  error: {:?}",
                stringify!($expr),
                e
            ),
        }
    };
}

/// Assert that a Result is Err and extract the error.
///
/// # Example
///
/// ```
/// use lodestar_macros::assert_err;
///
/// let err = assert_err!("x".parse::<u32>());
/// assert!(!err.to_string().is_empty());
/// ```
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!(
                "assertion failed: expected Err, got Ok\n  expression: `{}`\n  value: {:?}",
                stringify!($expr),
                v
            ),
            Err(e) => e,
        }
    };
}

/// Assert that a string contains a substring.
///
/// # Example
///
/// ```
/// use lodestar_macros::assert_contains;
///
/// assert_contains!("BrTrue L3, r4", "L3");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        if !$haystack.contains($needle) {
            panic!(
                "assertion failed: string does not contain substring\n  string: `{}`\n  expected: `{}`",
                $haystack, $needle
            );
        }
    };
}
