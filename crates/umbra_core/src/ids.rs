//! Identifiers and Bitmasks
//!
//! Queues and passes are identified by small indices (`0..32`) so that a set
//! of them fits in a single `u32` mask. Nodes carry aggregated masks of the
//! queues and passes their subtree can contribute to, which lets traversal
//! reject whole subtrees with one `AND`.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// Monotonically increasing frame counter supplied by the frame driver.
pub type FrameId = u64;

/// Maximum number of distinct queue or pass ids.
pub const MAX_MASK_BITS: u8 = 32;

macro_rules! id_and_mask {
    ($(#[$id_meta:meta])* $id:ident, $(#[$mask_meta:meta])* $mask:ident) => {
        $(#[$id_meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $id(u8);

        impl $id {
            /// Creates an id from its index.
            ///
            /// # Panics
            /// Panics if `index >= 32`.
            #[must_use]
            pub const fn new(index: u8) -> Self {
                assert!(index < MAX_MASK_BITS, "id index out of range");
                Self(index)
            }

            /// Returns the id index.
            #[inline]
            #[must_use]
            pub const fn index(self) -> u8 {
                self.0
            }

            /// Returns the single-bit mask for this id.
            #[inline]
            #[must_use]
            pub const fn bit(self) -> $mask {
                $mask(1 << self.0)
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($id), self.0)
            }
        }

        $(#[$mask_meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $mask(u32);

        impl $mask {
            pub const EMPTY: Self = Self(0);
            pub const ALL: Self = Self(u32::MAX);

            #[inline]
            #[must_use]
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            #[inline]
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            #[inline]
            #[must_use]
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            #[inline]
            #[must_use]
            pub const fn contains(self, id: $id) -> bool {
                self.0 & (1 << id.0) != 0
            }

            #[inline]
            pub fn insert(&mut self, id: $id) {
                self.0 |= 1 << id.0;
            }

            #[inline]
            pub fn remove(&mut self, id: $id) {
                self.0 &= !(1 << id.0);
            }

            #[inline]
            #[must_use]
            pub const fn count(self) -> u32 {
                self.0.count_ones()
            }

            /// Iterates the contained ids in ascending order.
            pub fn iter(self) -> impl Iterator<Item = $id> {
                let mut bits = self.0;
                std::iter::from_fn(move || {
                    if bits == 0 {
                        return None;
                    }
                    let index = bits.trailing_zeros() as u8;
                    bits &= bits - 1;
                    Some($id(index))
                })
            }
        }

        impl FromIterator<$id> for $mask {
            fn from_iter<I: IntoIterator<Item = $id>>(iter: I) -> Self {
                let mut mask = Self::EMPTY;
                for id in iter {
                    mask.insert(id);
                }
                mask
            }
        }

        impl From<$id> for $mask {
            fn from(id: $id) -> Self {
                id.bit()
            }
        }

        impl BitAnd for $mask {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }

        impl BitAndAssign for $mask {
            fn bitand_assign(&mut self, rhs: Self) {
                self.0 &= rhs.0;
            }
        }

        impl BitOr for $mask {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $mask {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl Not for $mask {
            type Output = Self;
            fn not(self) -> Self {
                Self(!self.0)
            }
        }

        impl fmt::Debug for $mask {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#034b})", stringify!($mask), self.0)
            }
        }
    };
}

id_and_mask!(
    /// Identifies one render queue.
    QueueId,
    /// Set of render queues.
    QueueMask
);

id_and_mask!(
    /// Identifies one render pass.
    PassId,
    /// Set of render passes.
    PassMask
);

impl QueueId {
    pub const OPAQUE: Self = Self(0);
    pub const TRANSPARENT: Self = Self(1);
    pub const BACKGROUND: Self = Self(2);
    pub const OVERLAY: Self = Self(3);
    pub const SHADOW_CASTER: Self = Self(4);
}

impl PassId {
    pub const DEPTH: Self = Self(0);
    pub const OPAQUE: Self = Self(1);
    pub const TRANSPARENT: Self = Self(2);
    pub const SHADOW: Self = Self(3);
    pub const OVERLAY: Self = Self(4);
}
