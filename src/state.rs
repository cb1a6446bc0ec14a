//! # Single Player State
//!
//! A [`State`] wraps a [`Field`] with a queue of upcoming deals, the action
//! space of its playable window and a seeded random source.
//!
//! ## Deals
//! With `num_deals` set the queue is a ring of that many deals: every played
//! deal is replaced by a fresh random one at the back. Without it the queue is
//! a fixed list consumed one deal at a time and restored on reset.
//!
//! ## Actions
//! Actions are `(column, orientation)` pairs restricted to the playable width:
//! `[(x, 0); w - 1] ++ [(x, 1); w] ++ [(x, 2); w - 1] ++ [(x, 3); w]`.

use std::collections::VecDeque;

use puyo_bits::{self as bits, WIDTH};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;

use crate::error::{ConfigError, RecordError};
use crate::field::{validation_action, validation_index, Action, Cell, Field, FieldShape, NUM_VALIDATION_ACTIONS};
use crate::GameState;

/// A pair of colors dropped together.
pub type Deal = (u8, u8);

/// Largest number of layers a field may carry.
pub const MAX_LAYERS: usize = 16;

/// Configuration of a single player state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateConfig {
    /// Playable height: 8, 13 (tsu rules) or 16
    pub height: usize,
    /// Playable width, at most 8
    pub width: usize,
    /// Number of deal colors, garbage excluded
    pub num_colors: usize,
    /// Length of the replenished deal ring, `None` for a fixed deal list
    pub num_deals: Option<usize>,
    pub tsu_rules: bool,
    /// Whether the field carries a garbage layer after the color layers
    pub has_garbage: bool,
    /// Explicit initial deals
    pub deals: Option<Vec<Deal>>,
    /// Seed for the deal generator, random when absent
    pub seed: Option<u64>,
    /// Assert field invariants after every move
    pub check_invariants: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            height: 8,
            width: 8,
            num_colors: 4,
            num_deals: Some(3),
            tsu_rules: false,
            has_garbage: false,
            deals: None,
            seed: None,
            check_invariants: false,
        }
    }
}

impl StateConfig {
    /// Narrow 8x3 field with three colors.
    pub fn small() -> Self {
        StateConfig { width: 3, num_colors: 3, ..Default::default() }
    }

    /// Full width 8x8 field with four colors.
    pub fn wide() -> Self {
        StateConfig::default()
    }

    /// Classic 13x6 field with the ghost row.
    pub fn tsu() -> Self {
        StateConfig { height: 13, width: 6, tsu_rules: true, ..Default::default() }
    }

    /// Tall 16x8 field with five colors.
    pub fn large() -> Self {
        StateConfig { height: 16, num_colors: 5, ..Default::default() }
    }

    /// Looks a preset up by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "small" => Some(Self::small()),
            "wide" => Some(Self::wide()),
            "tsu" => Some(Self::tsu()),
            "large" => Some(Self::large()),
            _ => None,
        }
    }

    /// Checks the configuration and picks the field shape backing it.
    pub fn validate(&self) -> Result<FieldShape, ConfigError> {
        if self.width > WIDTH {
            return Err(ConfigError::WidthTooLarge { width: self.width, max: WIDTH });
        }
        if self.width < 2 {
            return Err(ConfigError::WidthTooSmall(self.width));
        }
        let shape = FieldShape::for_height(self.height, self.tsu_rules)?;
        if self.num_colors == 0 {
            return Err(ConfigError::NoColors);
        }
        let num_layers = self.num_layers();
        if num_layers > MAX_LAYERS {
            return Err(ConfigError::TooManyLayers(num_layers));
        }
        match &self.deals {
            Some(deals) => check_deals(deals, self.num_colors)?,
            None if self.num_deals.is_none() => return Err(ConfigError::NoDealSource),
            None => {}
        }
        Ok(shape)
    }

    pub fn num_layers(&self) -> usize {
        self.num_colors + usize::from(self.has_garbage)
    }
}

fn check_deals(deals: &[Deal], num_colors: usize) -> Result<(), ConfigError> {
    for &(a, b) in deals {
        let color = a.max(b);
        if color as usize >= num_colors {
            return Err(ConfigError::DealColorOutOfRange { color, num_colors });
        }
    }
    Ok(())
}

/// Dense view of a state for learning code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// One-hot deals indexed `[color][deal][puyo]`
    pub deals: Vec<Vec<[u8; 2]>>,
    /// One-hot field indexed `[layer][row][column]` over the playable window
    pub field: Vec<Vec<Vec<u8>>>,
}

/// The full validation action space in index order.
pub fn validation_actions() -> Vec<Action> {
    (0..NUM_VALIDATION_ACTIONS).map(validation_action).collect()
}

fn playable_actions(width: usize) -> Vec<Action> {
    let mut actions = Vec::with_capacity(4 * width - 2);
    for swapped in [0, 2] {
        actions.extend((0..width - 1).map(|x| (x, swapped)));
        actions.extend((0..width).map(|x| (x, swapped + 1)));
    }
    actions
}

/// Single player state.
#[derive(Debug, Clone)]
pub struct State {
    height: usize,
    width: usize,
    num_colors: usize,
    num_deals: Option<usize>,
    tsu_rules: bool,
    check_invariants: bool,
    field: Field,
    deals: VecDeque<Deal>,
    initial_deals: Option<Vec<Deal>>,
    actions: Vec<Action>,
    /// Cloned verbatim, so a clone draws the same deals as its original until reseeded.
    rng: Xoshiro256PlusPlus,
    garbage_x: usize,
}

impl State {
    /// Builds a state from a validated configuration.
    pub fn new(config: StateConfig) -> Result<Self, ConfigError> {
        let shape = config.validate()?;
        let field = Field::new(shape, config.num_layers(), config.has_garbage);
        let mut state = State {
            height: config.height,
            width: config.width,
            num_colors: config.num_colors,
            num_deals: config.num_deals,
            tsu_rules: config.tsu_rules,
            check_invariants: config.check_invariants,
            field,
            deals: VecDeque::new(),
            initial_deals: config.deals,
            actions: playable_actions(config.width),
            rng: Xoshiro256PlusPlus::seed_from_u64(0),
            garbage_x: 0,
        };
        state.seed(config.seed);
        state.make_deals();
        Ok(state)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn num_colors(&self) -> usize {
        self.num_colors
    }

    pub fn num_layers(&self) -> usize {
        self.field.num_layers()
    }

    pub fn num_deals(&self) -> Option<usize> {
        self.num_deals
    }

    pub fn tsu_rules(&self) -> bool {
        self.tsu_rules
    }

    pub fn has_garbage(&self) -> bool {
        self.field.has_garbage()
    }

    pub fn check_invariants(&self) -> bool {
        self.check_invariants
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut Field {
        &mut self.field
    }

    pub fn deals(&self) -> &VecDeque<Deal> {
        &self.deals
    }

    /// Replaces the deal queue.
    pub fn set_deals<I: IntoIterator<Item = Deal>>(&mut self, deals: I) -> Result<(), ConfigError> {
        let mut deals: VecDeque<Deal> = deals.into_iter().collect();
        check_deals(deals.make_contiguous(), self.num_colors)?;
        self.deals = deals;
        Ok(())
    }

    /// The playable action space.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Reseeds the deal generator.
    ///
    /// # Returns
    /// The seed in use, drawn at random when `seed` is `None`.
    pub fn seed(&mut self, seed: Option<u64>) -> u64 {
        let seed = seed.unwrap_or_else(rand::random);
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        seed
    }

    /// Draws a seed from this state's generator, for deriving related states.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.random()
    }

    /// Empties the field and refills the deal queue.
    pub fn reset(&mut self) {
        self.field.reset();
        self.garbage_x = 0;
        self.make_deals();
    }

    fn make_deals(&mut self) {
        self.deals.clear();
        if let Some(deals) = &self.initial_deals {
            self.deals.extend(deals.iter().copied());
        } else if let Some(num_deals) = self.num_deals {
            for _ in 0..num_deals {
                self.make_deal();
            }
        }
    }

    /// Cells of the playable columns across every row.
    fn playable_columns(&self) -> u128 {
        bits::repeat(((1u16 << self.width) - 1) as u8)
    }

    /// Reflects the playable window left to right.
    pub fn mirror(&mut self) {
        self.field.mirror();
        self.field.shift(self.width as i32 - WIDTH as i32);
    }

    /// Moves the field `amount` columns to the right, left when negative.
    ///
    /// Cells leaving the playable columns are lost.
    pub fn shift(&mut self, amount: i32) {
        self.field.shift(amount);
        self.field.retain(self.playable_columns());
    }

    /// Appends a random deal to the queue.
    pub fn make_deal(&mut self) {
        let colors = self.num_colors as u8;
        let deal = (self.rng.random_range(0..colors), self.rng.random_range(0..colors));
        self.deals.push_back(deal);
    }

    /// Whether `action` lies in the playable window and fits the current field.
    pub fn validate_action(&self, action: Action) -> bool {
        let (x, orientation) = action;
        if x >= self.width || (orientation % 2 == 0 && x + 1 >= self.width) {
            return false;
        }
        match validation_index(action) {
            Some(index) => self.field.valid_mask() & (1 << index) != 0,
            None => false,
        }
    }

    /// Places the head deal without resolving the field.
    ///
    /// The action must have passed [`State::validate_action`]. Does nothing
    /// when the queue is empty.
    pub fn play_deal(&mut self, action: Action) {
        let Some((a, b)) = self.deals.pop_front() else {
            return;
        };
        if self.num_deals.is_some() {
            self.make_deal();
        }
        if let Some(index) = validation_index(action) {
            self.field.make_move(index, a, b);
        }
    }

    /// Plays the head deal and resolves the field.
    ///
    /// # Returns
    /// `-1` without touching the state when there is no deal or the action is
    /// invalid, otherwise the score of the resolve.
    pub fn step(&mut self, action: Action) -> i32 {
        if self.deals.is_empty() || !self.validate_action(action) {
            return -1;
        }
        self.play_deal(action);
        let (score, chain) = self.field.resolve();
        if chain > 0 {
            tracing::debug!(chain, score, "chain resolved");
        }
        if self.check_invariants {
            assert!(self.field.sane(), "overlapping layers after {:?}", action);
        }
        score
    }

    /// Validity of every playable action.
    pub fn get_action_mask(&self) -> Vec<bool> {
        let valid = self.field.valid_mask();
        self.actions
            .iter()
            .map(|&action| validation_index(action).is_some_and(|index| valid & (1 << index) != 0))
            .collect()
    }

    /// Bit mask of the playable actions over the validation action space.
    pub fn action_bits(&self) -> u32 {
        self.actions
            .iter()
            .filter_map(|&action| validation_index(action))
            .fold(0, |mask, index| mask | (1 << index))
    }

    /// Steps a clone of this state for every action.
    ///
    /// # Arguments
    /// * `complete` - Keep invalid actions as `(None, -1)` so that the result
    ///   lines up with [`State::actions`]
    pub fn get_children(&self, complete: bool) -> Vec<(Option<State>, i32)> {
        let mut children = Vec::with_capacity(self.actions.len());
        for &action in &self.actions {
            let mut child = self.clone();
            let reward = child.step(action);
            if reward < 0 {
                if complete {
                    children.push((None, -1));
                }
            } else {
                children.push((Some(child), reward));
            }
        }
        children
    }

    /// Drops garbage onto the field.
    ///
    /// Garbage fills the top row from a rolling column cursor, settling after
    /// every sweep across the playable width. Garbage that finds no room is lost.
    pub fn add_garbage(&mut self, amount: i32) -> Result<(), ConfigError> {
        if !self.field.has_garbage() {
            return Err(ConfigError::NoGarbageLayer);
        }
        if amount < 0 {
            return Err(ConfigError::NegativeGarbage(amount));
        }
        self.drop_garbage(amount as u32);
        Ok(())
    }

    pub(crate) fn drop_garbage(&mut self, amount: u32) {
        let Some(garbage) = self.field.garbage_layer() else {
            return;
        };
        let mut remaining = amount;
        let mut misses = 0;
        while remaining > 0 && misses < self.width {
            let occupied = self.field.occupied();
            let mut sweep = 0u128;
            loop {
                let bit = bits::cell(self.garbage_x, 0);
                if occupied & bit == 0 {
                    sweep |= bit;
                    remaining -= 1;
                    misses = 0;
                } else {
                    misses += 1;
                }
                self.garbage_x = (self.garbage_x + 1) % self.width;
                if remaining == 0 || self.garbage_x == 0 || misses >= self.width {
                    break;
                }
            }
            if sweep != 0 {
                self.field.insert(garbage, sweep);
                self.field.handle_gravity();
            }
        }
        if remaining > 0 {
            tracing::debug!(lost = remaining, "no room for garbage");
        }
    }

    /// One-hot deals indexed `[color][deal][puyo]`.
    pub fn encode_deals(&self) -> Vec<Vec<[u8; 2]>> {
        let len = self.num_deals.unwrap_or(self.deals.len());
        let mut encoded = vec![vec![[0u8; 2]; len]; self.num_colors];
        for (i, &(a, b)) in self.deals.iter().take(len).enumerate() {
            encoded[a as usize][i][0] = 1;
            encoded[b as usize][i][1] = 1;
        }
        encoded
    }

    /// One-hot field over the playable window, indexed `[layer][row][column]`.
    pub fn encode_field(&self) -> Vec<Vec<Vec<u8>>> {
        let skip = self.field.shape().height - self.height;
        self.field
            .encode()
            .into_iter()
            .map(|layer| {
                layer
                    .into_iter()
                    .skip(skip)
                    .map(|mut row| {
                        row.truncate(self.width);
                        row
                    })
                    .collect()
            })
            .collect()
    }

    pub fn encode(&self) -> Observation {
        Observation { deals: self.encode_deals(), field: self.encode_field() }
    }

    /// Two-row stack showing where `action` would put the head deal.
    ///
    /// # Returns
    /// `None` when the deal queue is empty or the action is malformed.
    pub fn get_deal_stack(&self, action: Action) -> Option<Vec<Cell>> {
        let &(a, b) = self.deals.front()?;
        let index = validation_index(action)?;
        let mut scratch = Field::new(FieldShape::BOTTOM, self.num_layers(), false);
        scratch.make_move(index, a, b);
        let mut stack = scratch.to_list();
        stack.truncate(2 * WIDTH);
        Some(stack)
    }

    /// Recovers a deal and an equivalent action from a two-row deal stack.
    ///
    /// The deal is read in row-major order, so the action always has
    /// orientation 0 or 1.
    pub fn infer_deal_and_action(stack: &[Cell]) -> Result<(Deal, Action), RecordError> {
        let uninferable = || RecordError::Uninferable(stack.to_vec());
        let mut puyos = stack.iter().enumerate().filter_map(|(i, cell)| cell.map(|p| (i, p)));
        let (x, a) = puyos.next().ok_or_else(uninferable)?;
        let (_, b) = puyos.next().ok_or_else(uninferable)?;
        if x >= WIDTH {
            return Err(uninferable());
        }
        let orientation = if x + 1 < WIDTH && stack.get(x + 1) == Some(&Some(b)) {
            0
        } else if stack.get(x + WIDTH) == Some(&Some(b)) {
            1
        } else {
            return Err(uninferable());
        };
        Ok(((a, b), (x, orientation)))
    }
}

impl GameState for State {
    fn actions(&self) -> &[Action] {
        &self.actions
    }

    fn get_action_mask(&self) -> Vec<bool> {
        State::get_action_mask(self)
    }

    fn get_children(&self, complete: bool) -> Vec<(Option<Self>, i32)> {
        State::get_children(self, complete)
    }

    fn state(&self) -> &State {
        self
    }
}
