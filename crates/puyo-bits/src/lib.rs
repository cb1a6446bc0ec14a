#![no_std]

//! Bitboard primitives for Puyo Puyo fields.
//!
//! A single layer of a field is packed into a `u128`. Row `r` occupies byte `r`
//! (bits `8r..8r + 7`) and column `c` is bit `c` of that byte, so a layer is the
//! same thing as a buffer of one byte per row. Row 0 is the top of the field and
//! gravity pulls towards higher rows.

/// Number of columns in every physical field.
pub const WIDTH: usize = 8;

/// Largest physical height a layer can hold.
pub const MAX_HEIGHT: usize = 16;

/// Smallest group of same-colored puyos that clears.
pub const CLEAR_THRESHOLD: u32 = 4;

/// Bit distance between horizontally adjacent cells.
pub const H_SHIFT: u32 = 1;

/// Bit distance between vertically adjacent cells.
pub const V_SHIFT: u32 = WIDTH as u32;

/// Repeats `byte` in every row of a layer.
pub const fn repeat(byte: u8) -> u128 {
    (byte as u128) * 0x0101_0101_0101_0101_0101_0101_0101_0101
}

/// Cells that have a neighbour to their left.
pub const RIGHT_BLOCK: u128 = repeat(0xFE);

/// Cells that have a neighbour to their right.
pub const LEFT_BLOCK: u128 = repeat(0x7F);

/// The top row of a layer.
pub const TOP: u128 = 0xFF;

/// Mask of a single full row.
pub const fn row(r: usize) -> u128 {
    if r >= MAX_HEIGHT {
        0
    } else {
        TOP << (V_SHIFT as usize * r)
    }
}

/// Mask of the rows `start..end`.
pub const fn rows(start: usize, end: usize) -> u128 {
    let mut mask = 0;
    let mut r = start;
    while r < end {
        mask |= row(r);
        r += 1;
    }
    mask
}

/// Bit of the cell at column `x`, row `y`.
pub const fn cell(x: usize, y: usize) -> u128 {
    1 << (x + WIDTH * y)
}

/// Counts the set bits of a layer.
pub fn popcount(puyos: u128) -> u32 {
    puyos.count_ones()
}

/// Counts the set bits of a row-byte buffer.
///
/// # Arguments
/// * `buffer` - One byte per row, as produced by `Field::to_bytes`
pub fn popcount_bytes(buffer: &[u8]) -> u32 {
    buffer.iter().map(|b| b.count_ones()).sum()
}

/// Returns the cells of `puyos` together with their orthogonal neighbours.
///
/// Neighbours past the left or right edge are dropped rather than wrapped into
/// the adjacent row. Neighbours past the bottom of a 128-bit layer vanish.
pub fn cross(puyos: u128) -> u128 {
    puyos
        | ((puyos << H_SHIFT) & RIGHT_BLOCK)
        | ((puyos >> H_SHIFT) & LEFT_BLOCK)
        | (puyos << V_SHIFT)
        | (puyos >> V_SHIFT)
}

/// Grows `source` inside `target` until it covers the whole 4-connected
/// component(s) of `target` it touches.
pub fn flood(source: u128, target: u128) -> u128 {
    let mut region = source & target;
    if region == 0 {
        return 0;
    }
    loop {
        let grown = cross(region) & target;
        if grown == region {
            return region;
        }
        region = grown;
    }
}

/// Reverses the column order of every row.
pub fn mirror(puyos: u128) -> u128 {
    let mut x = puyos;
    x = ((x >> 4) & repeat(0x0F)) | ((x & repeat(0x0F)) << 4);
    x = ((x >> 2) & repeat(0x33)) | ((x & repeat(0x33)) << 2);
    ((x >> 1) & repeat(0x55)) | ((x & repeat(0x55)) << 1)
}

/// Moves every cell `amount` columns to the right (left when negative).
///
/// Cells pushed past either edge are dropped.
pub fn shift(puyos: u128, amount: i32) -> u128 {
    if amount.unsigned_abs() as usize >= WIDTH {
        return 0;
    }
    if amount >= 0 {
        let n = amount as u32;
        (puyos << n) & repeat(0xFFu8 << n)
    } else {
        let n = amount.unsigned_abs();
        (puyos >> n) & repeat(0xFFu8 >> n)
    }
}

/// Isolates the lowest set bit of a layer.
pub fn lowest_bit(puyos: u128) -> u128 {
    puyos & puyos.wrapping_neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_count(buffer: &[u8]) -> u32 {
        let mut count = 0;
        for byte in buffer {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    count += 1;
                }
            }
        }
        count
    }

    #[test]
    fn test_popcount_bytes_exhaustive() {
        for pattern in 0..=u16::MAX {
            let buffer = pattern.to_le_bytes();
            assert_eq!(popcount_bytes(&buffer), reference_count(&buffer));
        }
    }

    #[test]
    fn test_popcount_matches_bytes() {
        let layer = repeat(0x81) | cell(3, 4);
        assert_eq!(popcount(layer), popcount_bytes(&layer.to_le_bytes()));
        assert_eq!(popcount(layer), 33);
    }

    #[test]
    fn test_cross_does_not_wrap() {
        let left = cell(0, 1);
        assert_eq!(cross(left), left | cell(1, 1) | cell(0, 0) | cell(0, 2));
        let right = cell(7, 1);
        assert_eq!(cross(right), right | cell(6, 1) | cell(7, 0) | cell(7, 2));
    }

    #[test]
    fn test_flood_stays_connected() {
        let target = cell(0, 0) | cell(1, 0) | cell(1, 1) | cell(3, 1) | cell(7, 0) | cell(0, 1);
        let region = flood(cell(0, 0), target);
        assert_eq!(region, cell(0, 0) | cell(1, 0) | cell(1, 1) | cell(0, 1));
        assert_eq!(flood(cell(5, 5), target), 0);
    }

    #[test]
    fn test_mirror_reverses_columns() {
        assert_eq!(mirror(cell(0, 2)), cell(7, 2));
        assert_eq!(mirror(cell(2, 6) | cell(5, 15)), cell(5, 6) | cell(2, 15));
        let layer = 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210u128;
        assert_eq!(mirror(mirror(layer)), layer);
    }

    #[test]
    fn test_shift_drops_overflow() {
        assert_eq!(shift(cell(7, 0) | cell(2, 3), 1), cell(3, 3));
        assert_eq!(shift(cell(0, 0) | cell(2, 3), -2), cell(0, 3));
        assert_eq!(shift(repeat(0xFF), 8), 0);
        assert_eq!(shift(cell(4, 4), 0), cell(4, 4));
    }

    #[test]
    fn test_rows() {
        assert_eq!(rows(0, 2), 0xFFFF);
        assert_eq!(rows(3, 3), 0);
        assert_eq!(row(16), 0);
        assert_eq!(rows(0, 16), u128::MAX);
    }

    #[test]
    fn test_lowest_bit() {
        assert_eq!(lowest_bit(cell(3, 2) | cell(1, 5)), cell(3, 2));
        assert_eq!(lowest_bit(0), 0);
    }
}
