// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling macros.

/// Early return with an error.
///
/// Accepts a message literal, a format string, or any expression convertible
/// into the function's error type.
///
/// # Example
///
/// ```
/// use lodestar_macros::bail;
///
/// fn depth(n: usize) -> Result<usize, String> {
///     if n > 64 {
///         bail!("nesting depth {} exceeds the limit", n);
///     }
///     Ok(n)
/// }
///
/// assert!(depth(65).is_err());
/// assert!(depth(3).is_ok());
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($msg.into())
    };
    ($fmt:literal, $($arg:tt)*) => {
        return Err(format!($fmt, $($arg)*).into())
    };
    ($err:expr $(,)?) => {
        return Err($err.into())
    };
}

/// Ensure a condition is true, or return an error.
///
/// # Example
///
/// ```
/// use lodestar_macros::ensure;
///
/// #[derive(Debug)]
/// enum Failure { Unbalanced(u32) }
///
/// fn balanced(depth: u32) -> Result<(), Failure> {
///     ensure!(depth == 0, Failure::Unbalanced(depth));
///     Ok(())
/// }
///
/// assert!(balanced(0).is_ok());
/// assert!(balanced(2).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:literal $(,)?) => {
        if !$cond {
            return Err($msg.into());
        }
    };
    ($cond:expr, $fmt:literal, $($arg:tt)+) => {
        if !$cond {
            return Err(format!($fmt, $($arg)+).into());
        }
    };
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

#[cfg(test)]
mod tests {
    #[derive(Debug, PartialEq)]
    enum Failure {
        Negative(i32),
    }

    #[test]
    fn test_ensure_message() {
        fn check(x: i32) -> Result<(), String> {
            ensure!(x > 0, "must be positive");
            Ok(())
        }

        assert!(check(1).is_ok());
        assert_eq!(check(0), Err("must be positive".to_string()));
    }

    #[test]
    fn test_ensure_typed_error() {
        fn check(x: i32) -> Result<(), Failure> {
            ensure!(x >= 0, Failure::Negative(x));
            Ok(())
        }

        assert_eq!(check(-4), Err(Failure::Negative(-4)));
    }

    #[test]
    fn test_bail_format() {
        fn fail(slot: u32) -> Result<(), String> {
            bail!("slot {} out of range", slot);
        }

        assert_eq!(fail(7), Err("slot 7 out of range".to_string()));
    }
}
