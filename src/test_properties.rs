//! Property tests for the interaction state machine.
//!
//! Arbitrary key sequences must keep the cursor on a real task (or slot 0 of
//! an empty column), never hand out a task id twice, and change the task
//! count by at most one per key.

use std::collections::HashSet;

use proptest::prelude::*;

use crate::app::{update, AppState, Effect, Mode};
use crate::keys::Key;
use crate::model::{Board, COLUMN_COUNT};

fn arb_key() -> impl Strategy<Value = Key> {
    prop_oneof![
        Just(Key::Up),
        Just(Key::Down),
        Just(Key::Left),
        Just(Key::Right),
        Just(Key::Enter),
        Just(Key::Esc),
        Just(Key::Backspace),
        Just(Key::Delete),
        Just(Key::Home),
        Just(Key::End),
        Just(Key::Other),
        prop::sample::select(vec![
            'h', 'j', 'k', 'l', 'a', 'e', 'd', 'y', 'n', 'i', '[', ']', '{', '}', '?', 'x', ' ',
        ])
        .prop_map(Key::Char),
    ]
}

fn seeded_board(counts: [usize; COLUMN_COUNT]) -> Board {
    let mut board = Board::default();
    for (column, count) in counts.iter().enumerate() {
        for n in 0..*count {
            board.add_task(column, &format!("task {n}")).unwrap();
        }
    }
    board
}

fn all_ids(board: &Board) -> Vec<u64> {
    board
        .columns
        .iter()
        .flat_map(|c| c.tasks.iter().map(|t| t.id))
        .collect()
}

proptest! {
    #[test]
    fn cursor_and_ids_hold_under_random_keys(
        counts in prop::array::uniform3(0usize..5),
        keys in prop::collection::vec(arb_key(), 0..300),
    ) {
        let mut state = AppState::new(seeded_board(counts));
        let mut issued: HashSet<u64> = all_ids(&state.board).into_iter().collect();

        for key in keys {
            let before: HashSet<u64> = all_ids(&state.board).into_iter().collect();
            let last_id = state.board.last_id();
            let (next, effect) = update(state, key);
            state = next;

            prop_assert!(state.cursor.is_valid(&state.board), "cursor {:?}", state.cursor);
            prop_assert!(state.board.last_id() >= last_id);

            let ids = all_ids(&state.board);
            prop_assert!(ids.len().abs_diff(before.len()) <= 1);
            if ids.len() != before.len() {
                prop_assert_eq!(effect, Effect::Persist);
            }

            let unique: HashSet<u64> = ids.iter().copied().collect();
            prop_assert_eq!(unique.len(), ids.len());
            for id in unique.difference(&before) {
                prop_assert!(!issued.contains(id), "id {} handed out twice", id);
                prop_assert_eq!(*id, state.board.last_id());
                issued.insert(*id);
            }
        }
    }

    #[test]
    fn dialogs_always_return_to_browsing_on_escape(
        keys in prop::collection::vec(arb_key(), 0..100),
    ) {
        let mut state = AppState::new(seeded_board([2, 1, 0]));
        for key in keys {
            state = update(state, key).0;
        }
        for _ in 0..2 {
            state = update(state, Key::Esc).0;
        }
        prop_assert_eq!(state.mode, Mode::Browsing);
    }
}
