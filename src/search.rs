//! # Expectimax Lookahead
//!
//! Depth limited search over placements. Known deals are searched
//! deterministically. Past the end of the deal queue every color pair is
//! averaged, counting `(a, b)` and `(b, a)` once each.
//!
//! Leaves are scored by [`Field::group_heuristic`] scaled by a factor, dead
//! positions by the death value of the field's scoring.
//!
//! The search works on bare fields and never touches a state's random source,
//! so the deals it assumes are exactly the ones already in the queue.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::field::{Action, Field, HALF_ACTIONS, NUM_VALIDATION_ACTIONS};
use crate::state::Deal;
use crate::GameState;

/// Discount applied per ply.
pub const GAMMA: f64 = 0.95;

/// Search knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSearchConfig {
    /// Plies searched, the move being chosen included
    pub depth: i32,
    /// Weight of the group heuristic at the leaves
    pub factor: f64,
    /// Below this fraction of occupied cells, moves that pop puyos are only
    /// played when nothing else is available
    pub occupation_threshold: f64,
}

impl Default for TreeSearchConfig {
    fn default() -> Self {
        TreeSearchConfig { depth: 3, factor: 0.22, occupation_threshold: 0.0 }
    }
}

impl TreeSearchConfig {
    pub fn small() -> Self {
        TreeSearchConfig { depth: 4, factor: 0.22, occupation_threshold: 0.4 }
    }

    pub fn wide() -> Self {
        TreeSearchConfig { depth: 3, factor: 0.22, occupation_threshold: 0.66 }
    }

    pub fn tsu() -> Self {
        TreeSearchConfig { depth: 2, factor: 0.22, occupation_threshold: 0.0 }
    }

    pub fn large() -> Self {
        TreeSearchConfig { depth: 2, factor: 0.22, occupation_threshold: 0.0 }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "small" => Some(Self::small()),
            "wide" => Some(Self::wide()),
            "tsu" => Some(Self::tsu()),
            "large" => Some(Self::large()),
            _ => None,
        }
    }
}

/// Value of `field` with `deals` still to come.
///
/// # Arguments
/// * `field` - Position to evaluate, left untouched
/// * `action_mask` - Placements allowed over the validation action space
/// * `deals` - Known upcoming deals, head first
/// * `depth` - Remaining plies
/// * `factor` - Weight of the group heuristic at the leaves
pub fn tree_search(field: &Field, action_mask: u32, deals: &[Deal], depth: i32, factor: f64) -> f64 {
    let death_value = field.shape().scoring().death_value();
    let valid = field.valid_mask() & action_mask;
    if valid == 0 {
        return death_value;
    }
    if depth <= 0 {
        return factor * field.group_heuristic() as f64;
    }

    let Some((&(a, b), rest)) = deals.split_first() else {
        let num_colors = field.num_colors() as u8;
        let mut total = 0.0;
        for c0 in 0..num_colors {
            for c1 in c0..num_colors {
                let weight = if c0 == c1 { 1.0 } else { 2.0 };
                total += weight * tree_search(field, action_mask, &[(c0, c1)], depth, factor);
            }
        }
        let pairs = f64::from(num_colors) * f64::from(num_colors);
        return total / pairs;
    };

    // Swapping a deal of one color changes nothing.
    let num_actions = if a == b { HALF_ACTIONS } else { NUM_VALIDATION_ACTIONS };
    let mut best = death_value;
    for index in (0..num_actions).filter(|&index| valid & (1 << index) != 0) {
        let mut child = field.clone();
        child.make_move(index, a, b);
        let (move_score, _) = child.resolve();
        let value = f64::from(move_score) + GAMMA * tree_search(&child, action_mask, rest, depth - 1, factor);
        if value > best {
            best = value;
        }
    }
    best
}

/// Indices into `state.actions()` of the best moves found.
///
/// Every child is scored by its reward plus the discounted search value of the
/// deals after the head deal. While the field is sparse, moves that pop puyos
/// are kept apart and returned only when no quiet move exists.
///
/// # Returns
/// Tied best indices. Empty when every move tops out.
pub fn tree_search_actions<S: GameState>(state: &S, config: &TreeSearchConfig) -> Vec<usize> {
    let inner = state.state();
    let deals: Vec<Deal> = inner.deals().iter().skip(1).copied().collect();
    let action_mask = inner.action_bits();
    let death_value = inner.field().shape().scoring().death_value();

    let base_popcount = inner.field().popcount();
    let capacity = (inner.width() * inner.height()) as f64;
    let prevent_chains = f64::from(base_popcount) < config.occupation_threshold * capacity;

    let mut best = (death_value, Vec::new());
    let mut possible = (death_value, Vec::new());
    for (index, (child, reward)) in state.get_children(true).into_iter().enumerate() {
        let Some(child) = child else {
            continue;
        };
        let field = child.state().field();
        let value = tree_search(field, action_mask, &deals, config.depth - 1, config.factor);
        let score = f64::from(reward) + GAMMA * value;

        let bucket = if prevent_chains && field.popcount() < base_popcount {
            &mut possible
        } else {
            &mut best
        };
        if score > bucket.0 {
            *bucket = (score, vec![index]);
        } else if score == bucket.0 {
            bucket.1.push(index);
        }
    }

    if best.1.is_empty() {
        possible.1
    } else {
        best.1
    }
}

/// Picks moves with [`tree_search_actions`], breaking ties at random.
#[derive(Debug, Clone)]
pub struct TreeSearchAgent {
    config: TreeSearchConfig,
    rng: Xoshiro256PlusPlus,
}

impl TreeSearchAgent {
    pub fn new(config: TreeSearchConfig, seed: u64) -> Self {
        TreeSearchAgent { config, rng: Xoshiro256PlusPlus::seed_from_u64(seed) }
    }

    pub fn config(&self) -> &TreeSearchConfig {
        &self.config
    }

    /// Chooses an action for `state`.
    ///
    /// A position in the middle of a chain ignores its action, so the first
    /// action is returned without searching. When every move tops out a random
    /// action is returned.
    pub fn get_action<S: GameState>(&mut self, state: &S) -> Action {
        let actions = state.actions();
        if state.is_resolving() {
            return actions[0];
        }
        let indices = tree_search_actions(state, &self.config);
        let index = if indices.is_empty() {
            self.rng.random_range(0..actions.len())
        } else {
            indices[self.rng.random_range(0..indices.len())]
        };
        actions[index]
    }

    /// Uniform distribution over the best actions, for imitation targets.
    pub fn get_distribution<S: GameState>(&self, state: &S) -> Vec<f64> {
        let num_actions = state.actions().len();
        let indices = tree_search_actions(state, &self.config);
        if indices.is_empty() {
            return vec![1.0 / num_actions as f64; num_actions];
        }
        let mut distribution = vec![0.0; num_actions];
        let weight = 1.0 / indices.len() as f64;
        for index in indices {
            distribution[index] = weight;
        }
        distribution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Cell, FieldShape};
    use crate::state::{State, StateConfig};

    const E: Cell = None;
    const R: Cell = Some(0);
    const G: Cell = Some(1);

    fn bottom(stack: &[Cell]) -> Field {
        let mut padded = vec![E; 64 - stack.len()];
        padded.extend_from_slice(stack);
        Field::from_list(FieldShape::BOTTOM, 2, false, &padded).unwrap()
    }

    #[test]
    fn test_dead_field_scores_death_value() {
        let mut stack = vec![E; 64];
        for (i, cell) in stack.iter_mut().enumerate() {
            *cell = Some(((i % 8 + i / 8) % 2) as u8);
        }
        let field = bottom(&stack);
        assert_eq!(tree_search(&field, u32::MAX, &[(0, 0)], 3, 0.22), -10.0);
    }

    #[test]
    fn test_leaf_uses_group_heuristic() {
        let field = bottom(&[R, R, G, E, E, E, E, E]);
        assert_eq!(field.group_heuristic(), 5);
        assert_eq!(tree_search(&field, u32::MAX, &[], 0, 2.0), 10.0);
    }

    #[test]
    fn test_finds_clearing_move() {
        let field = bottom(&[
            R, E, E, E, E, E, E, E, //
            R, E, E, E, E, E, E, E, //
            R, G, E, E, E, E, E, E,
        ]);
        // One more red on column 0 clears a group worth one point.
        let value = tree_search(&field, u32::MAX, &[(0, 1)], 1, 0.0);
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_unknown_deals_are_averaged() {
        let field = bottom(&[]);
        let known = tree_search(&field, u32::MAX, &[(0, 0)], 1, 1.0);
        let unknown = tree_search(&field, u32::MAX, &[], 1, 1.0);
        let mixed = tree_search(&field, u32::MAX, &[(0, 1)], 1, 1.0);
        let expected = (2.0 * known + 2.0 * mixed) / 4.0;
        assert!((unknown - expected).abs() < 1e-9);
    }

    #[test]
    fn test_search_prefers_the_chain() {
        let config = StateConfig { num_colors: 2, deals: Some(vec![(0, 0), (1, 1)]), seed: Some(1), ..Default::default() };
        let mut state = State::new(config).unwrap();
        let mut stack = vec![E; 64];
        stack[7 * 8 + 4] = R;
        stack[7 * 8 + 5] = R;
        state.field_mut().overlay(&stack).unwrap();
        let search = TreeSearchConfig { depth: 1, factor: 0.0, occupation_threshold: 0.0 };
        let indices = tree_search_actions(&state, &search);
        assert!(!indices.is_empty());
        for index in indices {
            let mut child = state.clone();
            assert_eq!(child.step(state.actions()[index]), 1);
        }
    }

    #[test]
    fn test_agent_is_reproducible() {
        let state = State::new(StateConfig { seed: Some(5), ..StateConfig::small() }).unwrap();
        let mut a = TreeSearchAgent::new(TreeSearchConfig::small(), 9);
        let mut b = TreeSearchAgent::new(TreeSearchConfig::small(), 9);
        assert_eq!(a.get_action(&state), b.get_action(&state));
        let distribution = a.get_distribution(&state);
        assert!((distribution.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
