use crate::{Addr, Cell};

/// Bytes available for a word's name.
pub const NAME_CAPACITY: usize = 16;

/// Byte offsets of the fields of a word record.
///
/// A record is packed: the name length byte comes first, so a counted string
/// laid down at `here` by `WORD` is already the name of a record created at
/// the same address.
pub(crate) mod field {
    use super::NAME_CAPACITY;
    use crate::CELL;

    pub const NAME_LEN: usize = 0;
    pub const NAME: usize = NAME_LEN + 1;
    pub const LINK: usize = NAME + NAME_CAPACITY;
    pub const FLAGS: usize = LINK + CELL;
    pub const BODY: usize = FLAGS + 1;
}

/// Size of a record header. The body starts right after it.
pub const HEADER_SIZE: usize = field::BODY;

/// An execution token: the address of a word record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Xt(pub(crate) Addr);

impl Xt {
    #[inline]
    pub fn addr(self) -> Addr {
        self.0
    }

    #[inline]
    pub fn to_cell(self) -> Cell {
        self.0 as Cell
    }

    /// Address 0 is never a record, so it doubles as "no word".
    #[inline]
    pub fn from_cell(cell: Cell) -> Option<Self> {
        match cell {
            0 => None,
            c => Some(Xt(c as Addr)),
        }
    }

    #[inline]
    pub(crate) fn body(self) -> Addr {
        self.0.wrapping_add(HEADER_SIZE)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    const NATIVE: u8 = 1 << 0;
    const IMMEDIATE: u8 = 1 << 1;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_native(self) -> bool {
        self.0 & Self::NATIVE != 0
    }

    pub const fn is_immediate(self) -> bool {
        self.0 & Self::IMMEDIATE != 0
    }

    #[must_use]
    pub const fn with_native(self) -> Self {
        Self(self.0 | Self::NATIVE)
    }

    #[must_use]
    pub const fn with_immediate(self) -> Self {
        Self(self.0 | Self::IMMEDIATE)
    }
}

/// What running a word means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body {
    /// Index into the engine's native table.
    Native(usize),
    /// Address of the first cell of a threaded body.
    Compiled(Addr),
}
