use gridbout_board::{BoardState, CellColor};
use gridbout_state::{DeltaTracker, ScalarState};

fn color(v: u32) -> Option<CellColor> {
    Some(CellColor(v))
}

#[test]
fn applying_deltas_reproduces_the_mutated_board() {
    let mut tracker = DeltaTracker::new(20, 10);
    let mut board = BoardState::standard();
    let mut scalars = ScalarState::default();

    // Receiver starts from the same empty state
    let mut mirror_board = BoardState::standard();
    let mut mirror_scalars = ScalarState::default();

    // A sequence of mutations resembling a few piece locks and a clear
    let steps: Vec<Vec<(u8, u8, Option<CellColor>)>> = vec![
        vec![(0, 19, color(1)), (1, 19, color(1)), (2, 19, color(1)), (2, 18, color(1))],
        vec![(4, 19, color(2)), (4, 18, color(2)), (5, 19, color(2)), (5, 18, color(2))],
        vec![(0, 19, None), (1, 19, None), (2, 19, None), (4, 19, None), (5, 19, None)],
        vec![(9, 19, color(3))],
    ];

    for (i, step) in steps.into_iter().enumerate() {
        for (x, y, cell) in step {
            board.set(x, y, cell);
        }
        scalars.score += 100;

        let batch = tracker
            .compute_delta(&board, &scalars)
            .unwrap()
            .expect("every step mutates something");
        batch.apply(&mut mirror_board, &mut mirror_scalars).unwrap();

        assert_eq!(mirror_board, board, "mirror diverged after step {i}");
        assert_eq!(mirror_scalars, scalars, "scalars diverged after step {i}");
    }
}

#[test]
fn full_sync_then_delta_converges_a_stale_mirror() {
    let mut tracker = DeltaTracker::new(20, 10);
    let mut board = BoardState::standard();
    let scalars = ScalarState::default();

    for x in 0..10 {
        board.set(x, 19, color(7));
    }
    // The mirror missed all of that
    let mut mirror_board = BoardState::standard();
    let mut mirror_scalars = ScalarState::default();
    mirror_board.set(5, 5, color(9));

    let full = tracker.create_full_sync(&board, &scalars);
    full.apply(&mut mirror_board, &mut mirror_scalars).unwrap();

    assert_eq!(mirror_board, board);
}

#[test]
fn force_sync_is_idempotent() {
    let mut tracker = DeltaTracker::new(20, 10);
    let mut board = BoardState::standard();
    board.set(3, 3, color(4));
    let scalars = ScalarState { score: 50, level: 1, incoming_garbage: 0 };

    let first = tracker.create_full_sync(&board, &scalars);
    let second = tracker.create_full_sync(&board, &scalars);

    assert_eq!(first, second);
    assert!(tracker.compute_delta(&board, &scalars).unwrap().is_none());
}
