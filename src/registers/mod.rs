//! Typed models of the CCPDv2 shift registers.
//!
//! Both registers are kept as packed bit arrays in the order they are shifted
//! into the chip: bit 0 of byte 0 goes first.

mod config;
mod global;

pub use config::{ColumnBit, ConfigRegister, RowBit, TrimSide};
pub use global::{GlobalDac, GlobalDacs, GlobalRegister};

/// Render a packed bit array as a string of `0`/`1`, first bit first.
fn bit_string(bits: &[u8], length: usize) -> String {
    use bit_field::BitArray;

    (0..length)
        .map(|i| if bits.get_bit(i) { '1' } else { '0' })
        .collect()
}

/// Split a bit string into consecutive chunks of the given sizes.
fn chunk_string(bits: &str, sizes: impl IntoIterator<Item = usize>) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    for size in sizes {
        out.push(bits[start..start + size].to_owned());
        start += size;
    }
    out
}
