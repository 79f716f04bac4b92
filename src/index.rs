//! Stable handles for atoms and bonds.
//!
//! A handle names an arena slot plus the generation at which the slot was
//! filled. Slots are reused after permanent removal with a bumped
//! generation, so a handle held across a removal goes stale instead of
//! silently pointing at an unrelated occupant. Handles stay valid across
//! detach/attach cycles, which is what lets undo park a sub-graph and put
//! it back under the same identities.

use std::fmt;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            slot: u32,
            generation: u32,
        }

        impl $name {
            pub(crate) const fn new(slot: u32, generation: u32) -> Self {
                Self { slot, generation }
            }

            #[inline]
            pub(crate) const fn slot(self) -> usize {
                self.slot as usize
            }

            #[inline]
            pub(crate) const fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "({}v{})"), self.slot, self.generation)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}v{}", self.slot, self.generation)
            }
        }
    };
}

define_handle!(
    /// Handle to an atom in a [`Molecule`](crate::Molecule).
    AtomId,
    "AtomId"
);

define_handle!(
    /// Handle to a bond in a [`Molecule`](crate::Molecule).
    BondId,
    "BondId"
);
