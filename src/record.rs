//! # Move Records
//!
//! A record is a JSON array with one entry per move. Each entry is the
//! two-row deal stack of the move: the deal drawn where the move puts it, `0`
//! for an empty cell and `color + 1` otherwise, restricted to the playable
//! width. Records are written one row per line so they stay readable:
//!
//! ```text
//! [[
//! 1, 2, 0, 0, 0, 0,
//! 0, 0, 0, 0, 0, 0
//! ],[
//! ...
//! ]]
//! ```
//!
//! Replaying a record infers every deal and action from its stack. Each step
//! of the replay sees the next `num_deals` deals of the record.

use std::collections::VecDeque;
use std::io::{Read, Write};

use puyo_bits::WIDTH;

use crate::error::RecordError;
use crate::field::{Action, Cell};
use crate::state::{Deal, State};

/// A position of a replayed record with the move played from it.
#[derive(Debug, Clone)]
pub struct RecordStep {
    /// The position before the move, with the record's upcoming deals
    pub state: State,
    pub action: Action,
    pub reward: i32,
}

fn encode_row(row: &[Cell]) -> String {
    row.iter()
        .map(|cell| cell.map_or(0, |color| color + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plays `actions` from a copy of `initial_state`, writing each deal stack.
///
/// Invalid actions are recorded but leave the replayed state as it was.
pub fn write_record<W: Write>(mut writer: W, initial_state: &State, actions: &[Action]) -> Result<(), RecordError> {
    let mut state = initial_state.clone();
    let width = state.width();
    writer.write_all(b"[[\n")?;
    for (i, &action) in actions.iter().enumerate() {
        if !state.actions().contains(&action) {
            return Err(RecordError::UnknownAction(action));
        }
        let stack = state.get_deal_stack(action).ok_or(RecordError::NoDeals)?;
        writeln!(writer, "{},", encode_row(&stack[..width]))?;
        writeln!(writer, "{}", encode_row(&stack[WIDTH..WIDTH + width]))?;
        if i + 1 == actions.len() {
            writer.write_all(b"]]")?;
        } else {
            writer.write_all(b"],[\n")?;
        }
        state.step(action);
    }
    if actions.is_empty() {
        writer.write_all(b"]]")?;
    }
    Ok(())
}

/// Replays a record on top of `base_state`.
///
/// # Returns
/// One step per record entry, in order.
pub fn read_record<R: Read>(reader: R, base_state: &State) -> Result<Vec<RecordStep>, RecordError> {
    let stacks: Vec<Vec<u8>> = serde_json::from_reader(reader)?;
    let Some(first) = stacks.first() else {
        return Ok(Vec::new());
    };
    let width = base_state.width();
    if first.len() % width != 0 {
        return Err(RecordError::Width(width));
    }
    let window = base_state.num_deals().ok_or(RecordError::UnboundedDeals)?;

    let mut state = base_state.clone();
    let mut delayed: VecDeque<(Deal, Action)> = VecDeque::with_capacity(window);
    let mut steps = Vec::with_capacity(stacks.len());
    for raw in &stacks {
        if raw.len() != 2 * width {
            return Err(RecordError::StackHeight(raw.len()));
        }
        let mut stack: Vec<Cell> = vec![None; 2 * WIDTH];
        for (i, &puyo) in raw.iter().enumerate() {
            let (x, y) = (i % width, i / width);
            stack[y * WIDTH + x] = puyo.checked_sub(1);
        }
        delayed.push_back(State::infer_deal_and_action(&stack)?);
        if delayed.len() == window {
            state.set_deals(delayed.iter().map(|&(deal, _)| deal))?;
            steps.push(replay_head(&mut state, &mut delayed));
        }
    }

    while !delayed.is_empty() {
        let mut deals: Vec<Deal> = state.deals().iter().copied().collect();
        for (slot, &(deal, _)) in deals.iter_mut().zip(&delayed) {
            *slot = deal;
        }
        state.set_deals(deals)?;
        steps.push(replay_head(&mut state, &mut delayed));
    }
    tracing::debug!(steps = steps.len(), "record replayed");
    Ok(steps)
}

fn replay_head(state: &mut State, delayed: &mut VecDeque<(Deal, Action)>) -> RecordStep {
    let snapshot = state.clone();
    let action = delayed.pop_front().map_or((0, 0), |(_, action)| action);
    let reward = state.step(action);
    RecordStep { state: snapshot, action, reward }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateConfig;

    #[test]
    fn test_encode_row() {
        assert_eq!(encode_row(&[None, Some(0), Some(3)]), "0, 1, 4");
    }

    #[test]
    fn test_empty_record() {
        let state = State::new(StateConfig::tsu()).unwrap();
        assert!(read_record("[]".as_bytes(), &state).unwrap().is_empty());
    }

    #[test]
    fn test_record_errors() {
        let state = State::new(StateConfig::tsu()).unwrap();
        assert!(matches!(read_record("[[1, 1, 0, 0]]".as_bytes(), &state), Err(RecordError::Width(6))));
        assert!(matches!(read_record("[[1, 1, 0, 0, 0, 0]]".as_bytes(), &state), Err(RecordError::StackHeight(6))));
        assert!(matches!(read_record("[[1, 1".as_bytes(), &state), Err(RecordError::Json(_))));
        let loose = "[[1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]]";
        assert!(matches!(read_record(loose.as_bytes(), &state), Err(RecordError::Uninferable(_))));
        let mut out = Vec::new();
        assert!(matches!(write_record(&mut out, &state, &[(6, 1)]), Err(RecordError::UnknownAction((6, 1)))));
    }
}
