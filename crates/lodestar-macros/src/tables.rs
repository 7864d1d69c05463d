// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opcode table macros.

/// Define an opcode enum numbered from zero in declaration order.
///
/// Generates `name()`, `all()` and `TryFrom<u16>`. Doc comments on
/// variants are kept.
///
/// # Example
///
/// ```
/// use lodestar_macros::opcodes;
///
/// opcodes! {
///     /// Tiny instruction set.
///     pub enum Op {
///         /// Do nothing.
///         Nop,
///         /// Copy a register.
///         Mov,
///     }
/// }
///
/// assert_eq!(Op::Mov as u16, 1);
/// assert_eq!(Op::try_from(0u16), Ok(Op::Nop));
/// assert_eq!(Op::Mov.name(), "Mov");
/// assert_eq!(Op::all().len(), 2);
/// ```
#[macro_export]
macro_rules! opcodes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $opcode:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        $vis enum $name {
            $($(#[$vmeta])* $opcode),+
        }

        impl $name {
            const ALL: &'static [$name] = &[$($name::$opcode),+];

            /// Returns the mnemonic.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$opcode => stringify!($opcode),)+
                }
            }

            /// Returns every opcode in numeric order.
            pub fn all() -> &'static [Self] {
                Self::ALL
            }
        }

        impl TryFrom<u16> for $name {
            type Error = u16;

            fn try_from(value: u16) -> Result<Self, u16> {
                Self::ALL.get(value as usize).copied().ok_or(value)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    opcodes! {
        enum Probe {
            First,
            Second,
            Third,
        }
    }

    #[test]
    fn test_opcodes_round_trip_through_u16() {
        for op in Probe::all() {
            assert_eq!(Probe::try_from(*op as u16), Ok(*op));
        }
        assert_eq!(Probe::try_from(3u16), Err(3));
        assert_eq!(Probe::Third.name(), "Third");
    }
}
