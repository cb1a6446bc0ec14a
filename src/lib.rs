//! # Puyo Puyo Rules Engine
//!
//! A bitboard implementation of the Puyo Puyo family of falling-block puzzles.
//! It keeps one or more fields packed into 128-bit layers, applies placements,
//! settles gravity, clears and scores chains and exchanges garbage between
//! players.
//!
//! ## Modules
//! - [`field`]: the multi-layer bitboard and its gravity, clearing and validity rules
//! - [`scoring`]: chain power, group and color bonus tables
//! - [`state`]: single player state with a deal queue and action space
//! - [`versus`]: the resumable chain state machine and multi-player [`versus::Game`]
//! - [`search`]: expectimax lookahead over the child-generation interface
//! - [`record`]: JSON move records built on deal stacks
//!
//! Nothing here blocks or shares state between threads. Independent games can
//! run on separate threads, each owning its own random source.

pub mod error;
pub mod field;
pub mod record;
pub mod scoring;
pub mod search;
pub mod state;
pub mod versus;

pub use error::{ConfigError, FieldError, RecordError};
pub use field::{Action, Cell, Field, FieldShape};
pub use state::{Deal, State, StateConfig};
pub use versus::{Game, VersusConfig, VersusState};

/// A position that search agents can expand.
///
/// Implementors must be cheap enough to clone that agents can explore
/// hypothetical futures without mutating the real game. `Send` and `Sync` let
/// independent searches run in parallel.
pub trait GameState: Clone + Send + Sync {
    /// The ordered action list.
    fn actions(&self) -> &[Action];
    /// Validity of every action, in the order of [`GameState::actions`].
    fn get_action_mask(&self) -> Vec<bool>;
    /// One `(child, reward)` entry per action.
    ///
    /// When `complete` is set, entries for actions that end the game carry no
    /// child, otherwise they may be left out or kept, depending on the state.
    fn get_children(&self, complete: bool) -> Vec<(Option<Self>, i32)>;
    /// The single player state underneath.
    fn state(&self) -> &State;
    /// Whether the position is in the middle of a chain and ignores actions.
    fn is_resolving(&self) -> bool {
        false
    }
}
