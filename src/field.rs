//! # Field
//!
//! The bit-packed playing field. Every layer is a `u128` holding one color (or
//! garbage) with one byte per row, see `puyo_bits` for the layout.
//!
//! A field is parameterized by its [`FieldShape`]. Short fields are 8 rows
//! tall. Tall fields have 16 physical rows. Under tsu rules only the bottom 13
//! rows are playable: the three rows above them are stray rows that are
//! emptied whenever groups are cleared, and the top playable row is the ghost
//! row where puyos may rest but never count towards a group.

use std::fmt;

use puyo_bits::{self as bits, CLEAR_THRESHOLD, V_SHIFT, WIDTH};

use crate::error::{ConfigError, FieldError};
use crate::scoring::Scoring;

/// A cell of a row-major stack: `None` when empty, otherwise the layer index.
pub type Cell = Option<u8>;

/// A placement: column of the left or lower puyo and an orientation in `0..4`.
///
/// Orientations 0 and 2 are horizontal, 1 and 3 vertical. Orientations 2 and 3
/// swap which puyo of the deal goes where.
pub type Action = (usize, u8);

/// Size of the validation action space.
pub const NUM_VALIDATION_ACTIONS: usize = 30;

/// Number of placements in one half of the validation space (7 horizontal, 8 vertical).
pub const HALF_ACTIONS: usize = 15;

const NUM_HORIZONTAL: usize = WIDTH - 1;

/// Maps an action onto its index in the validation action space.
///
/// The space is ordered `[(x, 0); 7] ++ [(x, 1); 8] ++ [(x, 2); 7] ++ [(x, 3); 8]`.
pub fn validation_index((x, orientation): Action) -> Option<usize> {
    let horizontal = orientation % 2 == 0;
    if (horizontal && x >= NUM_HORIZONTAL) || x >= WIDTH || orientation > 3 {
        return None;
    }
    let base = if orientation >= 2 { HALF_ACTIONS } else { 0 };
    Some(base + if horizontal { x } else { NUM_HORIZONTAL + x })
}

/// Inverse of [`validation_index`].
pub fn validation_action(index: usize) -> Action {
    let (swapped, local) = if index >= HALF_ACTIONS {
        (2, index - HALF_ACTIONS)
    } else {
        (0, index)
    };
    if local < NUM_HORIZONTAL {
        (local, swapped)
    } else {
        (local - NUM_HORIZONTAL, swapped + 1)
    }
}

/// Physical dimensions and ruleset of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldShape {
    /// Number of physical rows
    pub height: usize,
    /// Number of rows a player can build in
    pub playable_height: usize,
    /// Whether the ghost row and stray rows are in effect
    pub tsu_rules: bool,
}

impl FieldShape {
    pub const BOTTOM: FieldShape = FieldShape { height: 8, playable_height: 8, tsu_rules: false };
    pub const TALL: FieldShape = FieldShape { height: 16, playable_height: 16, tsu_rules: false };
    pub const TSU: FieldShape = FieldShape { height: 16, playable_height: 13, tsu_rules: true };

    /// Picks the shape backing a state of the given playable height.
    pub fn for_height(height: usize, tsu_rules: bool) -> Result<Self, ConfigError> {
        match (height, tsu_rules) {
            (8, false) => Ok(Self::BOTTOM),
            (16, false) => Ok(Self::TALL),
            (13, true) => Ok(Self::TSU),
            (8 | 13 | 16, _) => Err(ConfigError::TsuHeightMismatch),
            _ => Err(ConfigError::UnsupportedHeight(height)),
        }
    }

    /// Number of stray rows above the playable area.
    pub fn offset(&self) -> usize {
        self.height - self.playable_height
    }

    pub fn scoring(&self) -> Scoring {
        if self.height > 8 {
            Scoring::Classic
        } else {
            Scoring::Chain
        }
    }

    /// Every cell of the physical field.
    pub fn mask(&self) -> u128 {
        bits::rows(0, self.height)
    }

    /// Cells that may take part in a group.
    fn live_mask(&self) -> u128 {
        if self.tsu_rules {
            bits::rows(self.offset() + 1, self.height)
        } else {
            self.mask()
        }
    }

    fn stray_mask(&self) -> u128 {
        if self.tsu_rules {
            bits::rows(0, self.offset())
        } else {
            0
        }
    }
}

/// A multi-layer bitboard.
///
/// Layers `0..num_colors` hold colors. When garbage is enabled the last layer
/// holds garbage. At most one layer has a given bit set, see [`Field::sane`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    shape: FieldShape,
    has_garbage: bool,
    layers: Vec<u128>,
}

impl Field {
    /// Creates an empty field.
    ///
    /// # Arguments
    /// * `shape` - Physical dimensions and ruleset
    /// * `num_layers` - Number of layers including the garbage layer
    /// * `has_garbage` - Whether the last layer holds garbage
    pub fn new(shape: FieldShape, num_layers: usize, has_garbage: bool) -> Self {
        Field {
            shape,
            has_garbage: has_garbage && num_layers > 0,
            layers: vec![0; num_layers],
        }
    }

    /// Builds a field from a row-major stack, top row first.
    ///
    /// The stack may be shorter than the field. Rows it leaves out stay empty
    /// at the bottom.
    pub fn from_list(
        shape: FieldShape,
        num_layers: usize,
        has_garbage: bool,
        stack: &[Cell],
    ) -> Result<Self, FieldError> {
        let mut field = Field::new(shape, num_layers, has_garbage);
        field.layers = field.stack_layers(stack)?;
        Ok(field)
    }

    pub fn shape(&self) -> FieldShape {
        self.shape
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn num_colors(&self) -> usize {
        self.layers.len() - usize::from(self.has_garbage)
    }

    pub fn has_garbage(&self) -> bool {
        self.has_garbage
    }

    pub fn layer(&self, index: usize) -> u128 {
        self.layers[index]
    }

    pub fn layers(&self) -> &[u128] {
        &self.layers
    }

    /// Index of the garbage layer, if any.
    pub fn garbage_layer(&self) -> Option<usize> {
        self.has_garbage.then(|| self.layers.len() - 1)
    }

    /// Sets the given cells of one layer. Cells outside the field are ignored.
    pub fn insert(&mut self, layer: usize, puyos: u128) {
        self.layers[layer] |= puyos & self.shape.mask();
    }

    /// Clears every cell outside `puyos`.
    pub fn retain(&mut self, puyos: u128) {
        self.layers.iter_mut().for_each(|layer| *layer &= puyos);
    }

    pub fn reset(&mut self) {
        self.layers.iter_mut().for_each(|layer| *layer = 0);
    }

    /// Union of all layers.
    pub fn occupied(&self) -> u128 {
        self.layers.iter().fold(0, |all, layer| all | layer)
    }

    pub fn popcount(&self) -> u32 {
        self.layers.iter().map(|&layer| bits::popcount(layer)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// Checks that no two layers share a cell and nothing lies outside the field.
    pub fn sane(&self) -> bool {
        let mut seen = 0u128;
        for &layer in &self.layers {
            if seen & layer != 0 {
                return false;
            }
            seen |= layer;
        }
        seen & !self.shape.mask() == 0
    }

    /// Raw buffer with one byte per row, layer after layer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let height = self.shape.height;
        self.layers
            .iter()
            .flat_map(|layer| layer.to_le_bytes().into_iter().take(height))
            .collect()
    }

    /// Drops every unsupported cell until the field settles.
    ///
    /// Cells fall as whole columns of occupancy regardless of color. Each pass
    /// moves every unsupported cell down by one row.
    ///
    /// # Returns
    /// The number of passes performed. A field that is already settled
    /// returns 1.
    pub fn handle_gravity(&mut self) -> u32 {
        let floor = bits::row(self.shape.height - 1);
        let mut iterations = 0;
        loop {
            iterations += 1;
            let all = self.occupied();
            let supported = (all >> V_SHIFT) | floor;
            if all & !supported == 0 {
                return iterations;
            }
            for layer in &mut self.layers {
                let falling = *layer & !supported;
                *layer = (falling << V_SHIFT) | (*layer & supported);
            }
        }
    }

    /// Removes every group of at least `CLEAR_THRESHOLD` same-colored cells.
    ///
    /// Garbage next to a cleared cell is removed as well but never scores.
    /// Under tsu rules the stray rows are emptied first and the ghost row does
    /// not take part in groups.
    ///
    /// # Arguments
    /// * `chain_number` - Zero-based link of the chain this pass belongs to
    ///
    /// # Returns
    /// The score of this pass, zero if nothing cleared.
    pub fn clear_groups(&mut self, chain_number: i32) -> i32 {
        let scoring = self.shape.scoring();
        let stray = self.shape.stray_mask();
        if stray != 0 {
            for layer in &mut self.layers {
                *layer &= !stray;
            }
        }
        let live = self.shape.live_mask();

        let mut cleared = 0u128;
        let mut num_cleared = 0;
        let mut num_colors = 0;
        let mut group_bonus = 0;
        let color_layers = self.num_colors();
        for layer in self.layers.iter_mut().take(color_layers) {
            let mut remaining = *layer & live;
            let mut cleared_here = 0u128;
            while remaining != 0 {
                let group = bits::flood(bits::lowest_bit(remaining), remaining);
                remaining &= !group;
                let size = bits::popcount(group);
                if size >= CLEAR_THRESHOLD {
                    cleared_here |= group;
                    num_cleared += size;
                    group_bonus += scoring.group_bonus(size);
                }
            }
            if cleared_here != 0 {
                num_colors += 1;
                *layer &= !cleared_here;
                cleared |= cleared_here;
            }
        }

        if cleared != 0 {
            if let Some(garbage) = self.garbage_layer() {
                self.layers[garbage] &= !bits::cross(cleared);
            }
        }

        scoring.pass_score(chain_number, num_cleared, num_colors, group_bonus)
    }

    /// Alternates gravity and clearing until the field is stable.
    ///
    /// # Returns
    /// `(score, chain)` where `chain` counts the clearing passes. A scoring
    /// resolve that empties a tall field earns the all-clear bonus.
    pub fn resolve(&mut self) -> (i32, i32) {
        let mut total = 0;
        let mut chain = -1;
        loop {
            chain += 1;
            let iterations = self.handle_gravity();
            if iterations == 1 && chain > 0 {
                break;
            }
            let score = self.clear_groups(chain);
            if score == 0 {
                break;
            }
            tracing::trace!(chain, score, "cleared groups");
            total += score;
        }

        let stray = self.shape.stray_mask();
        if stray != 0 {
            for layer in &mut self.layers {
                *layer &= !stray;
            }
        }

        let scoring = self.shape.scoring();
        total = scoring.resolve_score(chain, total);
        if total > 0 && self.is_empty() {
            total += scoring.all_clear_bonus();
        }
        (total, chain)
    }

    /// Validity of every placement in one half of the validation space.
    ///
    /// Bits `0..7` are horizontal placements at columns `0..7`, bits `7..15`
    /// vertical placements at columns `0..8`. The second half of the space is
    /// the same placements with the deal swapped, so callers expand the mask
    /// with `valid | valid << HALF_ACTIONS`.
    pub fn valid_moves(&self) -> u32 {
        let all = self.occupied();
        if self.shape.tsu_rules {
            let ghost = all >> (V_SHIFT as usize * self.shape.offset());
            let free = (!ghost & bits::TOP) as u32;
            let horizontal = (free | (free >> 1)) & 0x7F;
            horizontal | (free << NUM_HORIZONTAL)
        } else {
            let free = (!all & bits::TOP) as u32;
            let horizontal = free & (free >> 1) & 0x7F;
            let vertical = (!(all | (all >> V_SHIFT)) & bits::TOP) as u32;
            horizontal | (vertical << NUM_HORIZONTAL)
        }
    }

    /// Valid placements over the full validation space.
    pub fn valid_mask(&self) -> u32 {
        let valid = self.valid_moves();
        valid | (valid << HALF_ACTIONS)
    }

    /// Commits a placement at the top of the field without checking it.
    ///
    /// Follow with [`Field::handle_gravity`] or [`Field::resolve`].
    ///
    /// # Arguments
    /// * `index` - Index into the validation action space
    /// * `color_a` - First puyo of the deal
    /// * `color_b` - Second puyo of the deal
    pub fn make_move(&mut self, index: usize, color_a: u8, color_b: u8) {
        let (x, orientation) = validation_action(index);
        let (a, b) = match orientation {
            0 => (bits::cell(x, 0), bits::cell(x + 1, 0)),
            1 => (bits::cell(x, 0), bits::cell(x, 1)),
            2 => (bits::cell(x + 1, 0), bits::cell(x, 0)),
            _ => (bits::cell(x, 1), bits::cell(x, 0)),
        };
        self.layers[color_a as usize] |= a;
        self.layers[color_b as usize] |= b;
    }

    /// Writes `stack` into the field if none of its cells are occupied.
    ///
    /// # Returns
    /// `Ok(false)` without touching the field when a cell is taken.
    pub fn overlay(&mut self, stack: &[Cell]) -> Result<bool, FieldError> {
        let incoming = self.stack_layers(stack)?;
        let all = self.occupied();
        if incoming.iter().any(|&layer| layer & all != 0) {
            return Ok(false);
        }
        self.merge(&incoming);
        Ok(true)
    }

    /// Writes `stack` into the field without checking for collisions.
    pub fn overlay_unsafe(&mut self, stack: &[Cell]) -> Result<(), FieldError> {
        let incoming = self.stack_layers(stack)?;
        self.merge(&incoming);
        Ok(())
    }

    fn merge(&mut self, incoming: &[u128]) {
        for (layer, bits) in self.layers.iter_mut().zip(incoming) {
            *layer |= bits;
        }
    }

    fn stack_layers(&self, stack: &[Cell]) -> Result<Vec<u128>, FieldError> {
        if stack.len() % WIDTH != 0 {
            return Err(FieldError::IncompleteRows { len: stack.len(), width: WIDTH });
        }
        let capacity = WIDTH * self.shape.height;
        if stack.len() > capacity {
            return Err(FieldError::TooManyPuyos { len: stack.len(), capacity });
        }
        let mut layers = vec![0u128; self.layers.len()];
        for (index, cell) in stack.iter().enumerate() {
            if let Some(color) = *cell {
                let layer = layers
                    .get_mut(color as usize)
                    .ok_or(FieldError::TooManyColors { color, num_layers: self.layers.len() })?;
                *layer |= 1u128 << index;
            }
        }
        Ok(layers)
    }

    /// Reflects the field left to right across all physical columns.
    pub fn mirror(&mut self) {
        for layer in &mut self.layers {
            *layer = bits::mirror(*layer);
        }
    }

    /// Moves every cell `amount` columns to the right, left when negative.
    ///
    /// Cells pushed out of the field are lost.
    pub fn shift(&mut self, amount: i32) {
        for layer in &mut self.layers {
            *layer = bits::shift(*layer, amount);
        }
    }

    /// Row-major list of every physical cell, top row first.
    pub fn to_list(&self) -> Vec<Cell> {
        (0..WIDTH * self.shape.height)
            .map(|index| {
                let bit = 1u128 << index;
                self.layers.iter().rposition(|&layer| layer & bit != 0).map(|k| k as u8)
            })
            .collect()
    }

    /// One-hot dense encoding indexed `[layer][row][column]`.
    pub fn encode(&self) -> Vec<Vec<Vec<u8>>> {
        self.layers
            .iter()
            .map(|&layer| {
                (0..self.shape.height)
                    .map(|y| (0..WIDTH).map(|x| u8::from(layer & bits::cell(x, y) != 0)).collect())
                    .collect()
            })
            .collect()
    }

    /// Sum of the squared sizes of all same-colored groups.
    pub fn group_heuristic(&self) -> i32 {
        let mut score = 0;
        for &layer in self.layers.iter().take(self.num_colors()) {
            let mut remaining = layer;
            while remaining != 0 {
                let group = bits::flood(bits::lowest_bit(remaining), remaining);
                remaining &= !group;
                let size = bits::popcount(group) as i32;
                score += size * size;
            }
        }
        score
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.shape.height {
            for x in 0..WIDTH {
                let bit = bits::cell(x, y);
                match self.layers.iter().position(|&layer| layer & bit != 0) {
                    Some(k) if Some(k) == self.garbage_layer() => write!(f, "# ")?,
                    Some(k) => write!(f, "{} ", k)?,
                    None => write!(f, ". ")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_index_round_trip() {
        for index in 0..NUM_VALIDATION_ACTIONS {
            assert_eq!(validation_index(validation_action(index)), Some(index));
        }
        assert_eq!(validation_index((7, 0)), None);
        assert_eq!(validation_index((7, 3)), Some(29));
        assert_eq!(validation_index((0, 4)), None);
    }

    #[test]
    fn test_shape_for_height() {
        assert_eq!(FieldShape::for_height(8, false), Ok(FieldShape::BOTTOM));
        assert_eq!(FieldShape::for_height(13, true), Ok(FieldShape::TSU));
        assert_eq!(FieldShape::for_height(13, false), Err(ConfigError::TsuHeightMismatch));
        assert_eq!(FieldShape::for_height(16, true), Err(ConfigError::TsuHeightMismatch));
        assert_eq!(FieldShape::for_height(12, false), Err(ConfigError::UnsupportedHeight(12)));
        assert_eq!(FieldShape::TSU.offset(), 3);
    }

    #[test]
    fn test_gravity_idempotent() {
        let mut field = Field::new(FieldShape::BOTTOM, 2, false);
        field.make_move(validation_index((3, 1)).unwrap(), 0, 1);
        assert!(field.handle_gravity() > 1);
        let settled = field.clone();
        assert_eq!(field.handle_gravity(), 1);
        assert_eq!(field, settled);
        assert_eq!(field.to_list()[6 * WIDTH + 3], Some(0));
        assert_eq!(field.to_list()[7 * WIDTH + 3], Some(1));
    }

    #[test]
    fn test_clear_threshold() {
        let mut field = Field::new(FieldShape::BOTTOM, 1, false);
        field.layers[0] = bits::cell(0, 7) | bits::cell(1, 7) | bits::cell(2, 7);
        assert_eq!(field.clear_groups(0), 0);
        assert_eq!(field.popcount(), 3);
        field.layers[0] |= bits::cell(2, 6);
        assert_eq!(field.clear_groups(0), 1);
        assert!(field.is_empty());
    }

    #[test]
    fn test_sane_detects_overlap() {
        let mut field = Field::new(FieldShape::BOTTOM, 2, false);
        field.layers[0] = bits::cell(1, 1);
        assert!(field.sane());
        field.layers[1] = bits::cell(1, 1);
        assert!(!field.sane());
        field.layers[1] = bits::cell(1, 9);
        assert!(!field.sane());
    }

    #[test]
    fn test_to_bytes_counts_like_popcount() {
        let mut field = Field::new(FieldShape::TALL, 3, true);
        field.layers[0] = bits::cell(0, 15) | bits::cell(1, 15);
        field.layers[2] = bits::cell(4, 2);
        let bytes = field.to_bytes();
        assert_eq!(bytes.len(), 48);
        assert_eq!(bits::popcount_bytes(&bytes), field.popcount());
    }

    #[test]
    fn test_display() {
        let mut field = Field::new(FieldShape::BOTTOM, 2, true);
        field.layers[0] = bits::cell(0, 7);
        field.layers[1] = bits::cell(1, 7);
        let text = field.to_string();
        assert_eq!(text.lines().count(), 8);
        assert_eq!(text.lines().last(), Some("0 # . . . . . . "));
    }
}
