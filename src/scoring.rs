//! # Chain Scoring
//!
//! Two scoring rulesets exist. Short fields count links: a full resolve that
//! clears `n` times scores exactly `n * n`, and a single clearing pass at link
//! `k` is worth `max(k, 1)²` so that even the first pass scores. Tall fields use the arcade formula
//! `10 * cleared * (chain power + group bonus + color bonus)` with the bonus
//! clamped to `1..=999`.

/// Chain power keyed by the zero-based link number, saturating at the last entry.
pub const CHAIN_POWERS: [i32; 24] = [
    0, 8, 16, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 480, 512, 544,
    576, 608, 640, 672,
];

/// Group bonus keyed by `size - CLEAR_THRESHOLD`, saturating at the last entry.
pub const GROUP_BONUS: [i32; 8] = [0, 2, 3, 4, 5, 6, 7, 10];

/// Color bonus keyed by the number of distinct colors cleared in one pass.
pub const COLOR_BONUS: [i32; 7] = [0, 0, 3, 6, 12, 24, 48];

/// Bonus for a scoring resolve that leaves the field empty.
pub const ALL_CLEAR_BONUS: i32 = 8500;

const MAX_BONUS: i32 = 999;

/// Scoring ruleset of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scoring {
    /// Score counts chain links only.
    Chain,
    /// Arcade scoring with chain power, group and color bonuses.
    Classic,
}

impl Scoring {
    /// Bonus awarded for one group of `size` cells.
    pub fn group_bonus(&self, size: u32) -> i32 {
        match self {
            Scoring::Chain => 0,
            Scoring::Classic => {
                let index = size.saturating_sub(puyo_bits::CLEAR_THRESHOLD) as usize;
                GROUP_BONUS[index.min(GROUP_BONUS.len() - 1)]
            }
        }
    }

    /// Scores a single clearing pass.
    ///
    /// # Arguments
    /// * `chain_number` - Zero-based link of the chain this pass belongs to
    /// * `cleared` - Number of colored cells removed (garbage excluded)
    /// * `num_colors` - Number of distinct colors removed
    /// * `group_bonus` - Sum of `group_bonus` over the cleared groups
    ///
    /// # Returns
    /// Zero when nothing was cleared, otherwise a positive score.
    pub fn pass_score(&self, chain_number: i32, cleared: u32, num_colors: usize, group_bonus: i32) -> i32 {
        if cleared == 0 {
            return 0;
        }
        match self {
            Scoring::Chain => {
                let link = chain_number.max(1);
                link * link
            }
            Scoring::Classic => {
                let link = (chain_number.max(0) as usize).min(CHAIN_POWERS.len() - 1);
                let colors = num_colors.min(COLOR_BONUS.len() - 1);
                let bonus = (CHAIN_POWERS[link] + COLOR_BONUS[colors] + group_bonus).clamp(1, MAX_BONUS);
                10 * cleared as i32 * bonus
            }
        }
    }

    /// Total of a resolve that cleared `chain` times with passes summing to `pass_total`.
    pub fn resolve_score(&self, chain: i32, pass_total: i32) -> i32 {
        match self {
            Scoring::Chain => chain * chain,
            Scoring::Classic => pass_total,
        }
    }

    /// Bonus for emptying the field with a scoring resolve.
    pub fn all_clear_bonus(&self) -> i32 {
        match self {
            Scoring::Chain => 0,
            Scoring::Classic => ALL_CLEAR_BONUS,
        }
    }

    /// Value a search assigns to a position with no legal move.
    pub fn death_value(&self) -> f64 {
        match self {
            Scoring::Chain => -10.0,
            Scoring::Classic => -10000.0,
        }
    }
}
