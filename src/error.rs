//! Error types for field construction, state configuration and move records.

use std::io;

/// A configuration that the engine refuses to build.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("maximum width is {max}, got {width}")]
    WidthTooLarge { width: usize, max: usize },
    #[error("width must be at least 2, got {0}")]
    WidthTooSmall(usize),
    #[error("unsupported height {0}, expected 8, 13 or 16")]
    UnsupportedHeight(usize),
    #[error("height 13 requires tsu rules and tsu rules require height 13")]
    TsuHeightMismatch,
    #[error("at least one color is required")]
    NoColors,
    #[error("{0} layers exceed the supported maximum")]
    TooManyLayers(usize),
    #[error("either num_deals or an explicit deal list is required")]
    NoDealSource,
    #[error("deal color {color} is out of range for {num_colors} colors")]
    DealColorOutOfRange { color: u8, num_colors: usize },
    #[error("target score must be positive")]
    NonPositiveTargetScore,
    #[error("state has no garbage layer")]
    NoGarbageLayer,
    #[error("garbage amount must be non-negative, got {0}")]
    NegativeGarbage(i32),
    #[error("a game needs at least one player")]
    NoPlayers,
}

/// A stack of cells that cannot be written into a field.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("puyos must form complete rows of {width}, got {len} cells")]
    IncompleteRows { len: usize, width: usize },
    #[error("too many puyos: {len} cells exceed the field capacity of {capacity}")]
    TooManyPuyos { len: usize, capacity: usize },
    #[error("color {color} does not fit in {num_layers} layers")]
    TooManyColors { color: u8, num_layers: usize },
}

/// Failure while reading or writing a move record.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid record for width {0}")]
    Width(usize),
    #[error("only height 2 stacks are supported, got {0} cells")]
    StackHeight(usize),
    #[error("unable to infer action from stack {0:?}")]
    Uninferable(Vec<Option<u8>>),
    #[error("action {0:?} is not available")]
    UnknownAction((usize, u8)),
    #[error("record state has no deal to place")]
    NoDeals,
    #[error("replaying a record needs a fixed deal window")]
    UnboundedDeals,
    #[error(transparent)]
    Config(#[from] ConfigError),
}
