//! Double-cell arithmetic.
//!
//! Double cells travel on the data stack as a `(low, high)` pair, but all of
//! the arithmetic happens on a little-endian byte array twice as wide as a
//! cell. Working a byte at a time keeps number accumulation exact no matter
//! how many digits are parsed, without leaning on native overflow behavior.

use crate::{Cell, CELL};

/// Width of a double cell in bytes.
pub const DOUBLE: usize = 2 * CELL;

/// A double cell as it sits on the stack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TwoCell {
    pub low: Cell,
    pub high: Cell,
}

/// A double cell as little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCell(pub [u8; DOUBLE]);

impl TwoCell {
    pub const fn new(low: Cell, high: Cell) -> Self {
        Self { low, high }
    }

    /// Widens a single cell, extending its sign into the high cell.
    pub const fn from_single(n: Cell) -> Self {
        Self {
            low: n,
            high: if n < 0 { -1 } else { 0 },
        }
    }
}

impl From<TwoCell> for ByteCell {
    fn from(tc: TwoCell) -> Self {
        let mut bytes = [0u8; DOUBLE];
        bytes[..CELL].copy_from_slice(&tc.low.to_le_bytes());
        bytes[CELL..].copy_from_slice(&tc.high.to_le_bytes());
        ByteCell(bytes)
    }
}

impl From<ByteCell> for TwoCell {
    fn from(bc: ByteCell) -> Self {
        let mut low = [0u8; CELL];
        let mut high = [0u8; CELL];
        low.copy_from_slice(&bc.0[..CELL]);
        high.copy_from_slice(&bc.0[CELL..]);
        TwoCell {
            low: Cell::from_le_bytes(low),
            high: Cell::from_le_bytes(high),
        }
    }
}

impl ByteCell {
    pub const ZERO: Self = ByteCell([0; DOUBLE]);

    /// Ripple-carry addition, wrapping at the double-cell width.
    pub fn add(self, other: Self) -> Self {
        let mut out = self.0;
        let mut carry = 0u16;
        for (o, b) in out.iter_mut().zip(other.0.iter()) {
            let acc = u16::from(*o) + u16::from(*b) + carry;
            *o = acc as u8;
            carry = acc >> 8;
        }
        ByteCell(out)
    }

    /// Shifts toward the high end by one byte, filling with zero.
    pub fn shl8(self) -> Self {
        let mut out = [0u8; DOUBLE];
        out[1..].copy_from_slice(&self.0[..DOUBLE - 1]);
        ByteCell(out)
    }

    /// Shifts toward the low end by one byte, filling with zero.
    pub fn shr8(self) -> Self {
        let mut out = [0u8; DOUBLE];
        out[..DOUBLE - 1].copy_from_slice(&self.0[1..]);
        ByteCell(out)
    }

    /// Multiplies every byte by `b`, carrying into the next one.
    pub fn mul_byte(self, b: u8) -> Self {
        let mut out = self.0;
        let mut carry = 0u16;
        for o in out.iter_mut() {
            let acc = u16::from(*o) * u16::from(b) + carry;
            *o = acc as u8;
            carry = acc >> 8;
        }
        ByteCell(out)
    }

    /// Schoolbook long multiplication, wrapping at the double-cell width.
    pub fn mul(self, other: Self) -> Self {
        let mut acc = ByteCell::ZERO;
        let mut shifted = self;
        for &b in other.0.iter() {
            acc = acc.add(shifted.mul_byte(b));
            shifted = shifted.shl8();
        }
        acc
    }
}

#[cfg(test)]
pub mod test {
    use super::{ByteCell, TwoCell, DOUBLE};
    use crate::Cell;

    const SAMPLES: &[TwoCell] = &[
        TwoCell::new(0, 0),
        TwoCell::new(1, 0),
        TwoCell::new(-1, -1),
        TwoCell::new(-2, 0),
        TwoCell::new(Cell::MAX, 0),
        TwoCell::new(Cell::MIN, Cell::MAX),
        TwoCell::new(123_456_789, -42),
        TwoCell::new(0x0102_0304, 0x7f00_0001),
    ];

    fn bc(low: Cell, high: Cell) -> ByteCell {
        TwoCell::new(low, high).into()
    }

    #[test]
    fn round_trip() {
        for &tc in SAMPLES {
            let bytes: ByteCell = tc.into();
            assert_eq!(TwoCell::from(bytes), tc);
        }
        // little endian: the low cell's least significant byte comes first
        assert_eq!(bc(1, 0).0[0], 1);
        assert_eq!(bc(0, 1).0[DOUBLE / 2], 1);
    }

    #[test]
    fn add() {
        for &a in SAMPLES {
            for &b in SAMPLES {
                let (a, b) = (ByteCell::from(a), ByteCell::from(b));
                assert_eq!(a.add(b), b.add(a));
                for &c in SAMPLES {
                    let c = ByteCell::from(c);
                    assert_eq!(a.add(b).add(c), a.add(b.add(c)));
                }
            }
        }
        // carry ripples from the low cell into the high cell
        assert_eq!(TwoCell::from(bc(-1, 0).add(bc(1, 0))), TwoCell::new(0, 1));
        assert_eq!(TwoCell::from(bc(-1, -1).add(bc(1, 0))), TwoCell::new(0, 0));
    }

    #[test]
    fn shifts() {
        assert_eq!(TwoCell::from(bc(0x0102, 0).shl8()), TwoCell::new(0x010200, 0));
        assert_eq!(TwoCell::from(bc(0x0102, 0).shr8()), TwoCell::new(0x01, 0));
        let top = bc(Cell::MIN, 0).shl8();
        assert_eq!(TwoCell::from(top), TwoCell::new(0, 0x80));
        assert_eq!(TwoCell::from(top.shr8()), TwoCell::new(Cell::MIN, 0));
    }

    #[test]
    fn mul() {
        for &a in SAMPLES {
            let a = ByteCell::from(a);
            assert_eq!(a.mul(bc(1, 0)), a);
            assert_eq!(a.mul(ByteCell::ZERO), ByteCell::ZERO);
        }
        assert_eq!(bc(3, 0).mul_byte(3), bc(9, 0));
        assert_eq!(TwoCell::from(bc(12, 0).mul(bc(10, 0))), TwoCell::new(120, 0));
        // a sign-extended -1 negates
        assert_eq!(bc(1234, 0).mul(TwoCell::from_single(-1).into()), bc(-1234, -1));
        // the product of two cells spills into the high cell
        let big = TwoCell::from(bc(Cell::MAX, 0).mul(bc(4, 0)));
        assert_eq!(big, TwoCell::new(-4, 1));
    }
}
