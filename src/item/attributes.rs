use std::fmt;

use derive_more::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Attribute bitset of a file-system entry.
///
/// `DIRECTORY` is authoritative for the file/directory split; an entry may carry
/// other bits alongside it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BitOr, BitAnd, BitOrAssign, BitAndAssign, Not,
)]
pub struct Attributes(u32);

impl Attributes {
    pub const NONE: Attributes = Attributes(0);
    pub const DIRECTORY: Attributes = Attributes(1 << 0);
    pub const READ_ONLY: Attributes = Attributes(1 << 1);
    pub const HIDDEN: Attributes = Attributes(1 << 2);
    /// Symlink / reparse point. Enumeration skips these to avoid cycles.
    pub const REPARSE_POINT: Attributes = Attributes(1 << 3);
    /// A logical volume exposed by the drive provider.
    pub const VOLUME: Attributes = Attributes(1 << 4);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Attributes) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Attributes) {
        *self |= other;
    }

    pub fn remove(&mut self, other: Attributes) {
        *self &= !other;
    }

    pub fn set(&mut self, other: Attributes, enabled: bool) {
        if enabled {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Attributes::DIRECTORY, 'd'),
            (Attributes::READ_ONLY, 'r'),
            (Attributes::HIDDEN, 'h'),
            (Attributes::REPARSE_POINT, 'l'),
            (Attributes::VOLUME, 'v'),
        ];
        for (flag, symbol) in flags {
            let symbol = if self.contains(flag) { symbol } else { '-' };
            write!(f, "{symbol}")?;
        }
        Ok(())
    }
}
