//! 432-bit pixel configuration register.
//!
//! The register is made of 12 ROW groups (each serving two pixel rows) followed
//! by 20 COLUMN groups (each serving three pixel columns). Group 0 of each kind
//! drives the *highest* rows/columns: pixel row `r` is served by ROW group
//! `11 - r / 2` and pixel column `c` by COLUMN group `19 - c / 3`.

use bit_field::BitArray;

/// Length of the configuration register in bits.
pub const CONFIG_BITS: usize = 432;
/// Number of ROW groups.
pub const ROW_GROUPS: usize = 12;
/// Number of COLUMN groups.
pub const COLUMN_GROUPS: usize = 20;
const ROW_GROUP_BITS: usize = 16;
const COLUMN_GROUP_BITS: usize = 12;
const COLUMN_BASE: usize = ROW_GROUPS * ROW_GROUP_BITS;
const TRIM_BITS: usize = 4;

/// Single-bit fields of a ROW group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowBit {
    /// Monitor enable of the left half (active low).
    EnL,
    /// Monitor enable of the right half (active low).
    EnR,
    /// Preamplifier enable, rows 1/2 of 4, column phase 0.
    En0,
    /// Preamplifier enable, rows 1/2 of 4, column phase 1.
    En1,
    /// Preamplifier enable, rows 1/2 of 4, column phase 2.
    En2,
    /// Preamplifier enable, rows 0/3 of 4, column phase 0.
    En3,
    /// Preamplifier enable, rows 0/3 of 4, column phase 1.
    En4,
    /// Preamplifier enable, rows 0/3 of 4, column phase 2.
    En5,
}

impl RowBit {
    /// The six preamplifier enables in order.
    pub const PREAMP: [RowBit; 6] = [
        RowBit::En0,
        RowBit::En1,
        RowBit::En2,
        RowBit::En3,
        RowBit::En4,
        RowBit::En5,
    ];

    fn offset(&self) -> usize {
        *self as usize
    }
}

/// The two 4-bit trim inputs of a ROW group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimSide {
    /// `InL`, serving pixel rows with `row % 4` of 1 or 2.
    Left,
    /// `InR`, serving pixel rows with `row % 4` of 0 or 3.
    Right,
}

impl TrimSide {
    /// Trim input that serves a pixel row.
    pub fn for_row(row: usize) -> Self {
        match row % 4 {
            1 | 2 => TrimSide::Left,
            _ => TrimSide::Right,
        }
    }

    fn offset(&self) -> usize {
        match self {
            TrimSide::Left => 8,
            TrimSide::Right => 12,
        }
    }
}

/// Single-bit fields of a COLUMN group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnBit {
    /// Monitor select, left, column phase 0.
    L0,
    /// Monitor select, right, column phase 0.
    R0,
    /// Monitor select, left, column phase 1.
    L1,
    /// Monitor select, right, column phase 1.
    R1,
    /// Monitor select, left, column phase 2.
    L2,
    /// Monitor select, right, column phase 2.
    R2,
    /// Trim latch, column phase 0.
    Ld0,
    /// Trim latch, column phase 1.
    Ld1,
    /// Trim latch, column phase 2.
    Ld2,
    /// Analog output enable.
    Ao,
}

impl ColumnBit {
    /// The six monitor selects in order.
    pub const MONITOR: [ColumnBit; 6] = [
        ColumnBit::L0,
        ColumnBit::R0,
        ColumnBit::L1,
        ColumnBit::R1,
        ColumnBit::L2,
        ColumnBit::R2,
    ];

    /// Monitor select for a column phase (`col % 3`) on the left or right side.
    pub fn monitor(left: bool, phase: usize) -> Self {
        Self::MONITOR[phase % 3 * 2 + usize::from(!left)]
    }

    /// Trim latch for a column phase (`col % 3`).
    pub fn latch(phase: usize) -> Self {
        [ColumnBit::Ld0, ColumnBit::Ld1, ColumnBit::Ld2][phase % 3]
    }

    fn offset(&self) -> usize {
        *self as usize
    }
}

/// Bit model of the pixel configuration register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRegister {
    bits: [u8; CONFIG_BITS / 8],
}

impl Default for ConfigRegister {
    fn default() -> Self {
        Self {
            bits: [0; CONFIG_BITS / 8],
        }
    }
}

impl ConfigRegister {
    /// ROW group serving a pixel row.
    pub fn row_group(row: usize) -> usize {
        ROW_GROUPS - 1 - row / 2
    }

    /// COLUMN group serving a pixel column.
    pub fn column_group(column: usize) -> usize {
        COLUMN_GROUPS - 1 - column / 3
    }

    /// Set a single-bit field of a ROW group.
    pub fn set_row_bit(&mut self, group: usize, field: RowBit, value: bool) {
        self.bits[..].set_bit(group * ROW_GROUP_BITS + field.offset(), value);
    }

    /// Read a single-bit field of a ROW group.
    pub fn row_bit(&self, group: usize, field: RowBit) -> bool {
        self.bits[..].get_bit(group * ROW_GROUP_BITS + field.offset())
    }

    /// Set a 4-bit trim input of a ROW group; only the low 4 bits of `code` are used.
    pub fn set_trim(&mut self, group: usize, side: TrimSide, code: u8) {
        let base = group * ROW_GROUP_BITS + side.offset();
        for bit in 0..TRIM_BITS {
            self.bits[..].set_bit(base + bit, (code >> bit) & 1 == 1);
        }
    }

    /// Read a 4-bit trim input of a ROW group.
    pub fn trim(&self, group: usize, side: TrimSide) -> u8 {
        let base = group * ROW_GROUP_BITS + side.offset();
        (0..TRIM_BITS)
            .filter(|&bit| self.bits[..].get_bit(base + bit))
            .fold(0u8, |code, bit| code | (1u8 << bit))
    }

    /// Set a single-bit field of a COLUMN group.
    pub fn set_column_bit(&mut self, group: usize, field: ColumnBit, value: bool) {
        self.bits[..].set_bit(COLUMN_BASE + group * COLUMN_GROUP_BITS + field.offset(), value);
    }

    /// Read a single-bit field of a COLUMN group.
    pub fn column_bit(&self, group: usize, field: ColumnBit) -> bool {
        self.bits[..].get_bit(COLUMN_BASE + group * COLUMN_GROUP_BITS + field.offset())
    }

    /// Packed register contents, first bit in bit 0 of byte 0.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// The register as `0`/`1` strings: 12 ROW groups of 16 characters followed by
    /// 20 COLUMN groups of 12 characters.
    pub fn group_strings(&self) -> Vec<String> {
        let bits = super::bit_string(&self.bits, CONFIG_BITS);
        let sizes = std::iter::repeat_n(ROW_GROUP_BITS, ROW_GROUPS)
            .chain(std::iter::repeat_n(COLUMN_GROUP_BITS, COLUMN_GROUPS));
        super::chunk_string(&bits, sizes)
    }
}
