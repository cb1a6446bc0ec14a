//! # Versus Play
//!
//! Two or more players drop deals at the same time and trade garbage. Unlike a
//! single player [`State`], a versus player resolves its field one settle and
//! clear pass per call, so a cascade spans several consecutive steps. Garbage
//! only moves when a player is idle.
//!
//! ## Chain progress
//! [`ChainProgress`] carries everything that survives between passes. Its
//! [`ChainProgress::advance`] runs a single pass and reports the garbage
//! released when a chain ends:
//!
//! ```text
//! Idle --move--> Idle                      (nothing cleared)
//! Idle --move--> Resolving { 1 }           (first group cleared)
//! Resolving { n } --pass--> Resolving { n + 1 }
//! Resolving { n } --pass--> Idle           (nothing fell, nothing cleared)
//! ```
//!
//! ## Garbage
//! Released garbage first cancels garbage owed to the same player. Whatever is
//! still owed drops in, capped per drop, once the player is idle.

use serde::Serialize;

use crate::error::ConfigError;
use crate::field::{Action, Field};
use crate::state::{State, StateConfig};
use crate::GameState;

/// Where a player is in the chain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainPhase {
    /// Waiting for the next move.
    #[default]
    Idle,
    /// A cascade is running; `chain_number` clearing passes have happened so far.
    Resolving { chain_number: i32 },
}

impl ChainPhase {
    pub fn chain_number(&self) -> i32 {
        match *self {
            ChainPhase::Idle => 0,
            ChainPhase::Resolving { chain_number } => chain_number,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ChainPhase::Idle)
    }
}

/// Score conversion rules of a versus player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRules {
    pub step_bonus: i32,
    pub all_clear_bonus: i32,
    pub target_score: i32,
}

/// Chain bookkeeping that persists between steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainProgress {
    pub phase: ChainPhase,
    /// Score of the running or most recently finished chain, remainder included
    pub chain_score: i32,
    /// Bonus accrued by the moves that started the chain
    pub step_score: i32,
    /// Garbage owed to this player
    pub pending_garbage: i32,
    /// The field emptied after the last chain and the bonus is not paid yet
    pub all_clear_pending: bool,
}

impl ChainProgress {
    /// Runs one gravity pass and one clearing pass.
    ///
    /// # Returns
    /// Garbage released by a chain that ended on this pass, before cancelling
    /// against pending garbage.
    pub fn advance(&mut self, field: &mut Field, rules: &ChainRules) -> i32 {
        let had_chain = !self.phase.is_idle();
        let fell = field.handle_gravity() > 1;
        let score = field.clear_groups(self.phase.chain_number());
        if score != 0 {
            self.chain_score += score;
            self.phase = ChainPhase::Resolving { chain_number: self.phase.chain_number() + 1 };
        }

        if !had_chain || fell || score != 0 {
            return 0;
        }

        let chain_number = self.phase.chain_number();
        self.phase = ChainPhase::Idle;
        self.chain_score += self.step_score;
        self.step_score = 0;
        if self.all_clear_pending {
            self.chain_score += rules.all_clear_bonus;
        }
        self.all_clear_pending = false;

        let mut released = 0;
        if self.chain_score >= 0 {
            released = self.chain_score / rules.target_score;
            self.chain_score %= rules.target_score;
        }
        if field.is_empty() {
            self.all_clear_pending = true;
        }
        tracing::debug!(chain_number, released, all_clear = self.all_clear_pending, "chain finished");
        released
    }

    /// Cancels released garbage against pending garbage.
    ///
    /// # Returns
    /// The part of `released` left to send to opponents.
    pub fn offset(&mut self, released: i32) -> i32 {
        if self.pending_garbage <= released {
            let sent = released - self.pending_garbage;
            self.pending_garbage = 0;
            sent
        } else {
            self.pending_garbage -= released;
            0
        }
    }

    /// Removes the garbage to drop in now.
    pub fn take_incoming(&mut self, max_received: Option<i32>) -> i32 {
        let amount = match max_received {
            Some(cap) => self.pending_garbage.min(cap),
            None => self.pending_garbage,
        };
        self.pending_garbage -= amount;
        amount
    }
}

/// Configuration of a versus player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersusConfig {
    /// Field and deal settings. The garbage layer is always enabled.
    pub state: StateConfig,
    /// Awarded for every move played while idle
    pub step_bonus: i32,
    pub all_clear_bonus: i32,
    /// Chain score per garbage puyo
    pub target_score: i32,
    /// Largest amount of garbage dropped in at once, unbounded when `None`
    pub max_received_garbage: Option<i32>,
}

impl Default for VersusConfig {
    fn default() -> Self {
        VersusConfig {
            state: StateConfig::default(),
            step_bonus: 0,
            all_clear_bonus: 0,
            target_score: 1,
            max_received_garbage: None,
        }
    }
}

impl VersusConfig {
    pub fn small() -> Self {
        VersusConfig { state: StateConfig::small(), ..Default::default() }
    }

    pub fn wide() -> Self {
        VersusConfig { state: StateConfig::wide(), all_clear_bonus: 16, ..Default::default() }
    }

    pub fn tsu() -> Self {
        VersusConfig {
            state: StateConfig::tsu(),
            step_bonus: 10,
            all_clear_bonus: 2100,
            target_score: 70,
            max_received_garbage: Some(30),
        }
    }

    pub fn large() -> Self {
        VersusConfig {
            state: StateConfig::large(),
            step_bonus: 10,
            all_clear_bonus: 2800,
            target_score: 70,
            max_received_garbage: Some(40),
        }
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

    fn rules(&self) -> ChainRules {
        ChainRules {
            step_bonus: self.step_bonus,
            all_clear_bonus: self.all_clear_bonus,
            target_score: self.target_score,
        }
    }
}

/// Dense view of a versus player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersusObservation {
    pub deals: Vec<Vec<[u8; 2]>>,
    pub field: Vec<Vec<Vec<u8>>>,
    pub chain_number: i32,
    /// Chain score plus step score not yet converted into garbage
    pub pending_score: i32,
    pub pending_garbage: i32,
    pub all_clear: u8,
}

/// A single versus player.
#[derive(Debug, Clone)]
pub struct VersusState {
    state: State,
    rules: ChainRules,
    max_received_garbage: Option<i32>,
    progress: ChainProgress,
}

impl VersusState {
    pub fn new(config: VersusConfig) -> Result<Self, ConfigError> {
        if config.target_score <= 0 {
            return Err(ConfigError::NonPositiveTargetScore);
        }
        let rules = config.rules();
        let state = State::new(StateConfig { has_garbage: true, ..config.state })?;
        Ok(VersusState {
            state,
            rules,
            max_received_garbage: config.max_received_garbage,
            progress: ChainProgress::default(),
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn progress(&self) -> &ChainProgress {
        &self.progress
    }

    pub fn rules(&self) -> &ChainRules {
        &self.rules
    }

    pub fn actions(&self) -> &[Action] {
        self.state.actions()
    }

    pub fn chain_number(&self) -> i32 {
        self.progress.phase.chain_number()
    }

    pub fn chain_score(&self) -> i32 {
        self.progress.chain_score
    }

    pub fn step_score(&self) -> i32 {
        self.progress.step_score
    }

    pub fn pending_garbage(&self) -> i32 {
        self.progress.pending_garbage
    }

    pub fn all_clear_pending(&self) -> bool {
        self.progress.all_clear_pending
    }

    /// Owes this player more garbage. It drops in on the next idle step.
    pub fn add_pending_garbage(&mut self, amount: i32) {
        self.progress.pending_garbage += amount;
    }

    /// Empties the field, refills the deals and forgets any chain.
    pub fn reset(&mut self) {
        self.state.reset();
        self.progress = ChainProgress::default();
    }

    /// Advances the player by one pass.
    ///
    /// While idle the head deal is played first. While a chain resolves the
    /// action is ignored.
    ///
    /// # Returns
    /// `(released_garbage, done)`, where `done` means the player topped out:
    /// no deal was left or the move did not fit.
    pub fn step(&mut self, action: Action) -> (i32, bool) {
        if self.progress.phase.is_idle() {
            if self.state.deals().is_empty() || !self.state.validate_action(action) {
                return (0, true);
            }
            self.state.play_deal(action);
            self.progress.step_score += self.rules.step_bonus;
        }

        let released = self.progress.advance(self.state.field_mut(), &self.rules);
        let released = self.progress.offset(released);

        if self.progress.phase.is_idle() {
            let amount = self.progress.take_incoming(self.max_received_garbage);
            if amount > 0 {
                tracing::debug!(amount, "garbage received");
            }
            self.state.drop_garbage(amount as u32);
            if self.state.tsu_rules() {
                let (score, _) = self.state.field_mut().resolve();
                debug_assert_eq!(score, 0, "garbage cleanup scored");
            }
        }

        if self.state.check_invariants() {
            assert!(self.state.field().sane(), "overlapping layers after {:?}", action);
        }
        (released, false)
    }

    /// All actions while a chain resolves, the single player mask otherwise.
    pub fn get_action_mask(&self) -> Vec<bool> {
        if self.progress.phase.is_idle() {
            self.state.get_action_mask()
        } else {
            vec![true; self.state.actions().len()]
        }
    }

    /// Steps a clone for every action.
    ///
    /// # Arguments
    /// * `complete` - Replace the children of moves that top out with `None`
    pub fn get_children(&self, complete: bool) -> Vec<(Option<VersusState>, i32)> {
        self.state
            .actions()
            .iter()
            .map(|&action| {
                let mut child = self.clone();
                let (released, done) = child.step(action);
                if done && complete {
                    (None, released)
                } else {
                    (Some(child), released)
                }
            })
            .collect()
    }

    pub fn encode(&self) -> VersusObservation {
        VersusObservation {
            deals: self.state.encode_deals(),
            field: self.state.encode_field(),
            chain_number: self.chain_number(),
            pending_score: self.progress.chain_score + self.progress.step_score,
            pending_garbage: self.progress.pending_garbage,
            all_clear: u8::from(self.progress.all_clear_pending),
        }
    }
}

impl GameState for VersusState {
    fn actions(&self) -> &[Action] {
        self.state.actions()
    }

    fn get_action_mask(&self) -> Vec<bool> {
        VersusState::get_action_mask(self)
    }

    fn get_children(&self, complete: bool) -> Vec<(Option<Self>, i32)> {
        VersusState::get_children(self, complete)
    }

    fn state(&self) -> &State {
        &self.state
    }

    fn is_resolving(&self) -> bool {
        !self.progress.phase.is_idle()
    }
}

/// Outcome of a game step from the first player's point of view.
pub type StepResult = (i32, i32, bool);

/// Players stepping in lockstep and trading garbage.
///
/// Every player starts from the same seed, so all of them see the same deals.
#[derive(Debug, Clone)]
pub struct Game {
    players: Vec<VersusState>,
    game_over: bool,
}

impl Game {
    /// # Arguments
    /// * `config` - Shared by every player. Its own seed is replaced.
    /// * `num_players` - At least one
    /// * `seed` - Deal seed shared by all players, random when `None`
    pub fn new(config: VersusConfig, num_players: usize, seed: Option<u64>) -> Result<Self, ConfigError> {
        if num_players == 0 {
            return Err(ConfigError::NoPlayers);
        }
        let seed = seed.unwrap_or_else(rand::random);
        let config = VersusConfig { state: StateConfig { seed: Some(seed), ..config.state }, ..config };
        let players = (0..num_players)
            .map(|_| VersusState::new(config.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Game { players, game_over: false })
    }

    pub fn players(&self) -> &[VersusState] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [VersusState] {
        &mut self.players
    }

    pub fn game_over(&self) -> bool {
        self.game_over
    }

    /// Steps every player with its action.
    ///
    /// # Returns
    /// `(result, garbage_sent, done)`. `result` is `1` when only opponents
    /// topped out, `-1` when only the first player did and `0` otherwise.
    /// `garbage_sent` is the first player's released garbage minus that of
    /// all opponents.
    pub fn step(&mut self, actions: &[Action]) -> StepResult {
        if self.game_over {
            return (0, 0, true);
        }
        assert_eq!(actions.len(), self.players.len(), "one action per player");
        let mut garbages = Vec::with_capacity(self.players.len());
        let mut dones = Vec::with_capacity(self.players.len());
        for (player, &action) in self.players.iter_mut().zip(actions) {
            let (garbage, done) = player.step(action);
            garbages.push(garbage);
            dones.push(done);
        }

        if dones.iter().any(|&done| done) {
            self.game_over = true;
            let first_lost = dones[0];
            let opponent_lost = dones[1..].iter().any(|&done| done);
            let result = match (first_lost, opponent_lost) {
                (true, true) => 0,
                (true, false) => -1,
                (false, _) => 1,
            };
            tracing::debug!(result, "game over");
            return (result, 0, true);
        }

        let offset = garbages.iter().copied().min().unwrap_or(0);
        for (i, &garbage) in garbages.iter().enumerate() {
            let amount = garbage - offset;
            if amount == 0 {
                continue;
            }
            for (j, opponent) in self.players.iter_mut().enumerate() {
                if i != j {
                    opponent.add_pending_garbage(amount);
                }
            }
        }
        let sent = garbages[0] - garbages[1..].iter().sum::<i32>();
        (0, sent, false)
    }

    /// Reseeds every player with the same seed.
    pub fn seed(&mut self, seed: Option<u64>) -> u64 {
        let seed = self.players[0].state_mut().seed(seed);
        for player in &mut self.players[1..] {
            player.state_mut().seed(Some(seed));
        }
        seed
    }

    /// Starts a new game with a seed drawn from the first player.
    pub fn reset(&mut self) {
        self.game_over = false;
        let seed = self.players[0].state_mut().next_seed();
        for player in &mut self.players {
            player.state_mut().seed(Some(seed));
            player.reset();
        }
    }

    pub fn encode(&self) -> Vec<VersusObservation> {
        self.players.iter().map(VersusState::encode).collect()
    }
}
