use puyo::field::{Cell, Field, FieldShape};

const E: Cell = None;
const R: Cell = Some(0);
const G: Cell = Some(1);
const Y: Cell = Some(2);
const B: Cell = Some(3);
const P: Cell = Some(4);

fn tall(shape: FieldShape, stack: &[Cell]) -> Field {
    Field::from_list(shape, 5, false, stack).unwrap()
}

/// Pads `rows` with empty rows on top so it fills 16 rows.
fn bottom_aligned(rows: &[Cell]) -> Vec<Cell> {
    let mut stack = vec![E; 128 - rows.len()];
    stack.extend_from_slice(rows);
    stack
}

#[test]
fn test_gravity() {
    #[rustfmt::skip]
    let mut field = tall(FieldShape::TALL, &[
        R, R, E, E, E, E, E, E,
        G, E, E, E, E, E, E, E,
        E, E, E, E, E, E, E, E,
        E, E, E, E, E, E, E, E,
        E, E, E, E, E, E, E, E,
        E, E, E, E, E, E, E, E,
        E, E, E, E, E, E, E, E,
        E, E, E, E, E, E, E, E,
        E, E, E, E, E, E, R, E,
        E, E, E, E, E, E, R, E,
        E, E, E, E, E, E, E, G,
    ]);
    field.handle_gravity();
    #[rustfmt::skip]
    let expected = bottom_aligned(&[
        R, E, E, E, E, E, R, E,
        G, R, E, E, E, E, R, G,
    ]);
    assert_eq!(field.to_list(), expected);
}

#[rustfmt::skip]
const PLAIN: [Cell; 64] = [
    E, G, E, E, E, E, E, E,
    E, G, E, E, E, E, E, E,
    E, G, E, E, E, E, E, E,
    E, B, G, E, E, E, E, E,
    E, G, B, E, E, E, E, E,
    E, G, B, E, E, E, E, E,
    R, R, G, E, E, E, E, E,
    R, R, G, G, E, E, E, E,
];

fn check_resolve_plain(shape: FieldShape) {
    let mut field = tall(shape, &bottom_aligned(&PLAIN));
    let (score, chain) = field.resolve();
    #[rustfmt::skip]
    let expected = bottom_aligned(&[
        E, E, B, E, E, E, E, E,
        E, B, B, E, E, E, E, E,
    ]);
    assert_eq!(field.to_list(), expected);
    assert_eq!(chain, 2);
    assert_eq!(score, 940);
}

#[test]
fn test_resolve_plain() {
    check_resolve_plain(FieldShape::TALL);
}

#[test]
fn test_resolve_plain_tsu() {
    check_resolve_plain(FieldShape::TSU);
}

#[test]
fn test_resolve_all_clear() {
    #[rustfmt::skip]
    let mut field = tall(FieldShape::TALL, &[
        R, G, E, E, E, E, E, E,
        E, E, R, E, E, E, E, E,
        E, E, R, E, E, E, E, E,
        E, E, R, E, E, E, E, E,
        E, E, Y, R, E, E, E, E,
        E, E, Y, R, E, E, E, E,
        E, E, Y, R, E, E, E, E,
        E, E, R, Y, E, E, E, E,
        E, E, R, Y, E, E, E, E,
        E, E, R, Y, E, E, E, E,
        E, E, Y, R, E, E, E, E,
        E, E, Y, R, E, E, E, E,
        E, E, Y, R, E, E, E, E,
        R, G, B, Y, E, E, E, E,
        R, R, G, B, E, E, E, E,
        G, G, B, B, E, E, E, E,
    ]);
    let (score, chain) = field.resolve();
    assert!(field.is_empty());
    assert_eq!(chain, 3);

    let mut expected = 8500;
    // Reds
    expected += 4 * 10;
    // Greens
    expected += 5 * 10 * (8 + 2);
    // Blues, yellows and reds
    let num_cleared = 26;
    let chain_power = 16;
    let group_bonuses = 3 + 3 + 3;
    let color_bonus = 6;
    expected += num_cleared * 10 * (chain_power + group_bonuses + color_bonus);
    assert_eq!(score, expected);
}

#[test]
fn test_resolve_ghost() {
    let column = [E, E, E, P, P, P, P, B, B, B, B, R, R, Y, G, G];
    let stack: Vec<Cell> = column
        .iter()
        .flat_map(|&cell| {
            let mut row = vec![E; 8];
            row[5] = cell;
            row
        })
        .collect();
    let mut field = tall(FieldShape::TSU, &stack);
    let (score, chain) = field.resolve();
    let mut expected = vec![E; 128];
    for (y, cell) in [(11, R), (12, R), (13, Y), (14, G), (15, G)] {
        expected[y * 8 + 5] = cell;
    }
    assert_eq!(field.to_list(), expected);
    assert_eq!(chain, 2);
    assert_eq!(score, 360);
}

#[test]
fn test_stray_rows_vanish() {
    let mut field = Field::new(FieldShape::TSU, 2, true);
    let mut stack = vec![E; 128];
    // A full garbage column with one more garbage puyo stuck in a stray row.
    stack[8] = Some(1);
    for y in 3..16 {
        stack[y * 8] = Some(1);
    }
    field.overlay(&stack).unwrap();
    assert_eq!(field.popcount(), 14);
    let (score, _) = field.resolve();
    assert_eq!(score, 0);
    assert_eq!(field.popcount(), 13);
    assert!(field.to_list()[..24].iter().all(Option::is_none));
}

#[test]
fn test_tsu_valid_moves_use_ghost_row() {
    let mut field = Field::new(FieldShape::TSU, 1, false);
    let mut stack = vec![E; 128];
    // Ghost row occupied at columns 1 and 2.
    stack[3 * 8 + 1] = R;
    stack[3 * 8 + 2] = R;
    field.overlay(&stack).unwrap();
    let valid = field.valid_moves();
    // Horizontal placements need either target column free.
    assert_eq!(valid & 0x7F, 0b111_1101);
    // Vertical placements need the ghost row free.
    assert_eq!(valid >> 7, 0b1111_1001);
}
