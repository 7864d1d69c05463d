// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type definition macros.

/// Define a `u32` index newtype for arenas, registers and tables.
///
/// Extra attributes (docs, serde derives) are forwarded to the struct.
///
/// # Example
///
/// ```
/// use lodestar_macros::index_newtype;
///
/// index_newtype! {
///     /// Index into a scope arena.
///     pub struct ScopeId;
/// }
///
/// let id = ScopeId::new(3);
/// assert_eq!(id.index(), 3);
/// assert_eq!(ScopeId::from(3u32), id);
/// ```
#[macro_export]
macro_rules! index_newtype {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        $vis struct $name(pub u32);

        impl $name {
            /// Creates an index from a `usize` position.
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            /// Returns the index as a `usize` position.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

#[cfg(test)]
mod tests {
    index_newtype! {
        /// Test index.
        pub struct Slot;
    }

    #[test]
    fn test_index_newtype_ordering() {
        assert!(Slot::new(1) < Slot::new(2));
        assert_eq!(u32::from(Slot::new(9)), 9);
        assert_eq!(Slot::default().index(), 0);
    }
}
