use puyo::record::{read_record, write_record};
use puyo::{State, StateConfig};

fn tsu_state() -> State {
    State::new(StateConfig { seed: Some(42), ..StateConfig::tsu() }).unwrap()
}

const RECORD: &str = "[[
1, 1, 0, 0, 0, 0,
0, 0, 0, 0, 0, 0
],[
0, 0, 1, 0, 0, 0,
0, 0, 2, 0, 0, 0
],[
0, 3, 2, 0, 0, 0,
0, 0, 0, 0, 0, 0
],[
3, 0, 0, 0, 0, 0,
3, 0, 0, 0, 0, 0
],[
0, 1, 2, 0, 0, 0,
0, 0, 0, 0, 0, 0
],[
0, 0, 0, 2, 0, 0,
0, 0, 0, 4, 0, 0
],[
0, 0, 0, 4, 0, 0,
0, 0, 0, 4, 0, 0
],[
0, 0, 0, 0, 1, 0,
0, 0, 0, 0, 1, 0
],[
0, 0, 0, 0, 1, 0,
0, 0, 0, 0, 4, 0
],[
0, 0, 0, 0, 0, 2,
0, 0, 0, 0, 0, 2
],[
0, 0, 0, 0, 0, 2,
0, 0, 0, 0, 0, 1
],[
3, 4, 0, 0, 0, 0,
0, 0, 0, 0, 0, 0
]]";

#[test]
fn test_read_record() {
    let expected = [
        (0, 0),
        (2, 1),
        (1, 0),
        (0, 1),
        (1, 0),
        (3, 1),
        (3, 1),
        (4, 1),
        (4, 1),
        (5, 1),
        (5, 1),
        (0, 0),
    ];
    let steps = read_record(RECORD.as_bytes(), &tsu_state()).unwrap();
    assert_eq!(steps.len(), expected.len());
    let mut total = 0;
    for (step, &(x, orientation)) in steps.iter().zip(expected.iter()) {
        assert_eq!(step.action.0, x);
        assert_eq!(step.action.1 % 2, orientation);
        assert!(step.reward >= 0);
        total += step.reward;
    }
    assert_eq!(total, 4840);
    // Every replayed position sees the record's deals ahead of it.
    assert_eq!(steps[0].state.deals().iter().copied().collect::<Vec<_>>(), vec![(0, 0), (0, 1), (2, 1)]);
}

#[test]
fn test_write_record() {
    let state = tsu_state();
    let actions = state.actions().to_vec();
    let mut out = Vec::new();
    write_record(&mut out, &state, &actions).unwrap();
    let stacks: Vec<Vec<u8>> = serde_json::from_slice(&out).unwrap();
    assert_eq!(stacks.len(), actions.len());
    assert!(stacks.iter().all(|stack| stack.len() == 12));
    assert_ne!(stacks[0][0], 0);
    assert!(stacks.last().unwrap().iter().any(|&puyo| puyo != 0));
}

#[test]
fn test_written_record_replays() {
    let state = tsu_state();
    let actions = [(0, 1), (1, 1), (2, 1), (3, 1), (4, 1), (5, 1)];
    let mut out = Vec::new();
    write_record(&mut out, &state, &actions).unwrap();
    let steps = read_record(out.as_slice(), &state).unwrap();
    assert_eq!(steps.len(), actions.len());

    let mut replay = state.clone();
    let mut played = state.clone();
    for (step, &action) in steps.iter().zip(actions.iter()) {
        assert_eq!(step.action.0, action.0);
        replay.set_deals(step.state.deals().iter().copied()).unwrap();
        replay.step(step.action);
        played.step(action);
    }
    assert_eq!(replay.field().popcount(), played.field().popcount());
}
