//! Interaction state machine.
//!
//! The whole UI state is one `AppState` value. `update` consumes it together
//! with a key and hands back the next state plus the `Effect` the runtime must
//! carry out before reading the next key:
//!
//! ```text
//! AppState + Key  ->  update()  ->  AppState + Effect
//! ```
//!
//! Board mutations happen inside `update`; writing them to disk is the
//! `Effect::Persist` the caller runs synchronously via `persist`.

use crate::keys::{Key, TextBuffer};
use crate::model::{Board, BoardError, TaskId, COLUMN_COUNT};
use crate::storage::{save_board, BoardLocation};
use log::{debug, error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub column: usize,
    pub task: usize,
}

/// Task bound to an open dialog, resolved again by id when the dialog commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub column: usize,
    pub id: TaskId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Insert,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub entry: Entry,
    pub buffer: TextBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    ConfirmingDelete { target: TaskRef },
    Editing { target: TaskRef, prompt: Prompt },
    AddingNew(Prompt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Persist,
    Quit,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub board: Board,
    pub cursor: Cursor,
    pub mode: Mode,
    pub show_help: bool,
    pub status: String,
    pub error: Option<String>,
}

enum PromptStep {
    Continue(Prompt),
    Commit(String),
    Cancel,
}

impl Cursor {
    /// Whether the cursor addresses a task of `board`, or slot 0 of an empty column.
    pub fn is_valid(&self, board: &Board) -> bool {
        self.column < COLUMN_COUNT && self.task < board.column_len(self.column).max(1)
    }

    fn clamp_to(&mut self, board: &Board) {
        self.column = self.column.min(COLUMN_COUNT - 1);
        self.task = self
            .task
            .min(board.column_len(self.column).saturating_sub(1));
    }
}

impl Prompt {
    fn insert(text: &str) -> Self {
        Prompt {
            entry: Entry::Insert,
            buffer: TextBuffer::new(text),
        }
    }
}

impl AppState {
    pub fn new(board: Board) -> Self {
        AppState {
            board,
            cursor: Cursor::default(),
            mode: Mode::Browsing,
            show_help: true,
            status: String::new(),
            error: None,
        }
    }

    pub fn current_task_ref(&self) -> Option<TaskRef> {
        self.board
            .task(self.cursor.column, self.cursor.task)
            .map(|task| TaskRef {
                column: self.cursor.column,
                id: task.id,
            })
    }

    fn browse(&mut self, key: Key) -> Effect {
        match key {
            Key::Char('q') => return Effect::Quit,
            Key::Up | Key::Char('k') => self.prev_task(),
            Key::Down | Key::Char('j') => self.next_task(),
            Key::Left | Key::Char('h') => self.prev_column(),
            Key::Right | Key::Char('l') => self.next_column(),
            Key::Char('[') | Key::Char('{') => return self.move_selected(-1),
            Key::Char(']') | Key::Char('}') => return self.move_selected(1),
            Key::Char('?') => self.show_help = !self.show_help,
            Key::Char('a') => {
                self.mode = Mode::AddingNew(Prompt::insert(""));
                self.status = format!("New task in {}", self.column_title(self.cursor.column));
            }
            Key::Char('e') => {
                if let Some(target) = self.current_task_ref() {
                    let title = self
                        .board
                        .task(self.cursor.column, self.cursor.task)
                        .map(|t| t.title.clone())
                        .unwrap_or_default();
                    self.mode = Mode::Editing {
                        target,
                        prompt: Prompt::insert(&title),
                    };
                    self.status = format!("Editing task #{}", target.id);
                }
            }
            Key::Char('d') => {
                if let Some(target) = self.current_task_ref() {
                    self.mode = Mode::ConfirmingDelete { target };
                    self.status = format!("Delete task #{}? (y/n)", target.id);
                }
            }
            _ => {}
        }
        Effect::None
    }

    fn confirm_delete(&mut self, target: TaskRef, key: Key) -> Effect {
        match key {
            Key::Char('y') | Key::Char('Y') => self.delete_target(target),
            Key::Char('n') | Key::Char('N') | Key::Esc => {
                self.status = "Delete canceled".into();
                Effect::None
            }
            _ => {
                self.mode = Mode::ConfirmingDelete { target };
                Effect::None
            }
        }
    }

    fn add_prompt(&mut self, prompt: Prompt, key: Key) -> Effect {
        match step_prompt(prompt, key) {
            PromptStep::Continue(prompt) => {
                self.mode = Mode::AddingNew(prompt);
                Effect::None
            }
            PromptStep::Commit(title) => self.commit_add(&title),
            PromptStep::Cancel => {
                self.status = "Add canceled".into();
                Effect::None
            }
        }
    }

    fn edit_prompt(&mut self, target: TaskRef, prompt: Prompt, key: Key) -> Effect {
        match step_prompt(prompt, key) {
            PromptStep::Continue(prompt) => {
                self.mode = Mode::Editing { target, prompt };
                Effect::None
            }
            PromptStep::Commit(title) => self.commit_edit(target, &title),
            PromptStep::Cancel => {
                self.status = "Edit canceled".into();
                Effect::None
            }
        }
    }

    fn commit_add(&mut self, title: &str) -> Effect {
        let column = self.cursor.column;
        match self.board.add_task(column, title) {
            Ok(task) => {
                let id = task.id;
                info!("added task #{} to column {}", id, column);
                self.cursor.task = self.board.column_len(column).saturating_sub(1);
                self.status = format!("Added task #{}", id);
                Effect::Persist
            }
            Err(BoardError::InvalidInput(_)) => {
                self.status = "Nothing added".into();
                Effect::None
            }
            Err(err) => self.internal_error(err),
        }
    }

    fn commit_edit(&mut self, target: TaskRef, title: &str) -> Effect {
        let Some(index) = self.board.position_of(target.column, target.id) else {
            self.status = format!("Task #{} no longer exists", target.id);
            return Effect::None;
        };
        match self.board.edit_task(target.column, index, title) {
            Ok(()) => {
                info!("renamed task #{}", target.id);
                self.status = format!("Updated task #{}", target.id);
                Effect::Persist
            }
            Err(BoardError::InvalidInput(_)) => {
                self.status = "Edit canceled".into();
                Effect::None
            }
            Err(err) => self.internal_error(err),
        }
    }

    fn delete_target(&mut self, target: TaskRef) -> Effect {
        let Some(index) = self.board.position_of(target.column, target.id) else {
            self.status = format!("Task #{} no longer exists", target.id);
            return Effect::None;
        };
        match self.board.delete_task(target.column, index) {
            Ok(task) => {
                info!("deleted task #{} from column {}", task.id, target.column);
                let remaining = self.board.column_len(target.column);
                self.cursor = Cursor {
                    column: target.column,
                    task: index.min(remaining.saturating_sub(1)),
                };
                self.status = format!("Deleted task #{}", task.id);
                Effect::Persist
            }
            Err(err) => self.internal_error(err),
        }
    }

    fn move_selected(&mut self, delta: isize) -> Effect {
        if self.board.column_len(self.cursor.column) == 0 {
            return Effect::None;
        }
        let target = self.cursor.column as isize + delta;
        if target < 0 || target >= COLUMN_COUNT as isize {
            return Effect::None;
        }
        let target = target as usize;
        match self.board.move_task(self.cursor.column, self.cursor.task, target) {
            Ok(index) => {
                let id = self.board.task(target, index).map(|t| t.id).unwrap_or_default();
                info!("moved task #{} to column {}", id, target);
                self.cursor = Cursor {
                    column: target,
                    task: index,
                };
                self.status = format!("Moved task #{} to {}", id, self.column_title(target));
                Effect::Persist
            }
            Err(err) => self.internal_error(err),
        }
    }

    fn prev_task(&mut self) {
        self.cursor.task = self.cursor.task.saturating_sub(1);
    }

    fn next_task(&mut self) {
        if self.cursor.task + 1 < self.board.column_len(self.cursor.column) {
            self.cursor.task += 1;
        }
    }

    fn prev_column(&mut self) {
        if self.cursor.column > 0 {
            self.cursor.column -= 1;
            self.cursor.task = 0;
        }
    }

    fn next_column(&mut self) {
        if self.cursor.column + 1 < COLUMN_COUNT {
            self.cursor.column += 1;
            self.cursor.task = 0;
        }
    }

    fn column_title(&self, column: usize) -> &str {
        self.board
            .columns
            .get(column)
            .map(|c| c.title.as_str())
            .unwrap_or_default()
    }

    fn internal_error(&mut self, err: BoardError) -> Effect {
        error!("board invariant violated: {}", err);
        self.status = format!("Internal error: {}", err);
        Effect::None
    }
}

fn step_prompt(mut prompt: Prompt, key: Key) -> PromptStep {
    match (prompt.entry, key) {
        (_, Key::Enter) => return PromptStep::Commit(prompt.buffer.value().to_string()),
        (Entry::Insert, Key::Esc) => prompt.entry = Entry::Normal,
        (Entry::Insert, key) => prompt.buffer.apply(key),
        (Entry::Normal, Key::Esc) => return PromptStep::Cancel,
        (Entry::Normal, Key::Char('i')) => prompt.entry = Entry::Insert,
        (Entry::Normal, Key::Left | Key::Char('h')) => prompt.buffer.move_left(),
        (Entry::Normal, Key::Right | Key::Char('l')) => prompt.buffer.move_right(),
        (Entry::Normal, _) => {}
    }
    PromptStep::Continue(prompt)
}

/// Applies one key to the state machine.
pub fn update(mut state: AppState, key: Key) -> (AppState, Effect) {
    let mode = std::mem::replace(&mut state.mode, Mode::Browsing);
    if key == Key::Interrupt {
        debug!("interrupt received in {:?}", mode);
        return (state, Effect::Quit);
    }
    let effect = match mode {
        Mode::Browsing => state.browse(key),
        Mode::ConfirmingDelete { target } => state.confirm_delete(target, key),
        Mode::AddingNew(prompt) => state.add_prompt(prompt, key),
        Mode::Editing { target, prompt } => state.edit_prompt(target, prompt, key),
    };
    state.cursor.clamp_to(&state.board);
    debug_assert!(state.cursor.is_valid(&state.board));
    debug!("{:?} -> {:?} ({:?})", key, state.mode, effect);
    (state, effect)
}

/// Writes the board; a failure is kept on the state for display instead of
/// aborting the session.
pub fn persist(state: &mut AppState, location: &BoardLocation) {
    match save_board(location, &state.board) {
        Ok(()) => state.error = None,
        Err(err) => {
            error!("save failed: {}", err);
            state.error = Some(format!("Save failed: {}", err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::load_board;
    use tempfile::tempdir;

    fn press(state: AppState, keys: &[Key]) -> (AppState, Vec<Effect>) {
        let mut state = state;
        let mut effects = Vec::new();
        for key in keys {
            let (next, effect) = update(state, *key);
            state = next;
            effects.push(effect);
        }
        (state, effects)
    }

    fn typed(text: &str) -> Vec<Key> {
        text.chars().map(Key::Char).collect()
    }

    fn add_keys(title: &str) -> Vec<Key> {
        let mut keys = vec![Key::Char('a')];
        keys.extend(typed(title));
        keys.push(Key::Enter);
        keys
    }

    fn state_with(titles: &[&[&str]]) -> AppState {
        let mut board = Board::default();
        for (col, tasks) in titles.iter().enumerate() {
            for title in tasks.iter() {
                board.add_task(col, title).unwrap();
            }
        }
        AppState::new(board)
    }

    fn titles(state: &AppState, column: usize) -> Vec<&str> {
        state.board.columns[column]
            .tasks
            .iter()
            .map(|t| t.title.as_str())
            .collect()
    }

    #[test]
    fn add_move_delete_scenario() {
        let dir = tempdir().unwrap();
        let location = BoardLocation::new(dir.path().join(".kanban.json"));

        let (mut state, effects) = press(AppState::new(Board::default()), &add_keys("Write plan"));
        assert_eq!(effects.last(), Some(&Effect::Persist));
        persist(&mut state, &location);
        assert_eq!(titles(&state, 0), ["Write plan"]);
        assert_eq!(state.board.columns[0].tasks[0].id, 1);

        let (mut state, effects) = press(state, &[Key::Char(']'), Key::Char('}')]);
        assert_eq!(effects, [Effect::Persist, Effect::Persist]);
        persist(&mut state, &location);
        assert_eq!(state.cursor, Cursor { column: 2, task: 0 });
        assert_eq!(state.board.columns[2].tasks[0].id, 1);
        assert_eq!(titles(&state, 2), ["Write plan"]);
        assert_eq!(state.board.task_count(), 1);

        let (mut state, effects) = press(state, &[Key::Char('d'), Key::Char('y')]);
        assert_eq!(effects, [Effect::None, Effect::Persist]);
        persist(&mut state, &location);
        assert_eq!(state.mode, Mode::Browsing);
        assert_eq!(state.board.task_count(), 0);
        assert_eq!(load_board(&location).unwrap(), Board::default());
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let state = state_with(&[&["a", "b"], &[], &["c"]]);
        let (state, _) = press(state, &[Key::Up, Key::Char('k'), Key::Left, Key::Char('h')]);
        assert_eq!(state.cursor, Cursor::default());

        let (state, _) = press(state, &[Key::Down, Key::Char('j'), Key::Down]);
        assert_eq!(state.cursor, Cursor { column: 0, task: 1 });

        let (state, _) = press(state, &[Key::Right, Key::Down, Key::Char('l'), Key::Right]);
        assert_eq!(state.cursor, Cursor { column: 2, task: 0 });
    }

    #[test]
    fn blank_add_creates_nothing() {
        let state = state_with(&[&["a"], &[], &[]]);
        let (state, effects) = press(state, &add_keys("   "));
        assert_eq!(effects.last(), Some(&Effect::None));
        assert_eq!(state.mode, Mode::Browsing);
        assert_eq!(state.board.task_count(), 1);
        assert_eq!(state.board.last_id(), 1);
    }

    #[test]
    fn add_selects_new_task() {
        let state = state_with(&[&["a", "b"], &[], &[]]);
        let (state, _) = press(state, &add_keys("c"));
        assert_eq!(state.cursor, Cursor { column: 0, task: 2 });
        assert_eq!(state.status, "Added task #3");
    }

    #[test]
    fn insert_entry_forwards_command_letters_to_buffer() {
        let state = AppState::new(Board::default());
        let (state, effects) = press(state, &[Key::Char('a'), Key::Char('q'), Key::Char('d'), Key::Char('?')]);
        assert!(effects.iter().all(|e| *e == Effect::None));
        assert!(state.show_help);
        match &state.mode {
            Mode::AddingNew(prompt) => {
                assert_eq!(prompt.entry, Entry::Insert);
                assert_eq!(prompt.buffer.value(), "qd?");
            }
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn escape_keeps_buffer_and_i_resumes_insert() {
        let state = AppState::new(Board::default());
        let mut keys = vec![Key::Char('a')];
        keys.extend(typed("abc"));
        keys.extend([Key::Esc, Key::Char('x'), Key::Char('h'), Key::Char('i'), Key::Char('Z')]);
        let (state, _) = press(state, &keys);
        match &state.mode {
            Mode::AddingNew(prompt) => {
                assert_eq!(prompt.entry, Entry::Insert);
                assert_eq!(prompt.buffer.value(), "abZc");
            }
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn enter_from_normal_entry_commits() {
        let state = AppState::new(Board::default());
        let mut keys = vec![Key::Char('a')];
        keys.extend(typed("later"));
        keys.extend([Key::Esc, Key::Enter]);
        let (state, effects) = press(state, &keys);
        assert_eq!(effects.last(), Some(&Effect::Persist));
        assert_eq!(titles(&state, 0), ["later"]);
    }

    #[test]
    fn double_escape_discards_dialog() {
        let state = state_with(&[&["a"], &[], &[]]);
        let mut keys = vec![Key::Char('a')];
        keys.extend(typed("zzz"));
        keys.extend([Key::Esc, Key::Esc]);
        let (state, effects) = press(state, &keys);
        assert_eq!(state.mode, Mode::Browsing);
        assert!(effects.iter().all(|e| *e == Effect::None));
        assert_eq!(state.board.task_count(), 1);
    }

    #[test]
    fn edit_prefills_and_renames_in_place() {
        let state = state_with(&[&["a", "draft"], &[], &[]]);
        let (state, _) = press(state, &[Key::Down, Key::Char('e')]);
        match &state.mode {
            Mode::Editing { target, prompt } => {
                assert_eq!(*target, TaskRef { column: 0, id: 2 });
                assert_eq!(prompt.buffer.value(), "draft");
            }
            other => panic!("unexpected mode {:?}", other),
        }
        let mut keys = vec![Key::Backspace; 5];
        keys.extend(typed("final"));
        keys.push(Key::Enter);
        let (state, effects) = press(state, &keys);
        assert_eq!(effects.last(), Some(&Effect::Persist));
        assert_eq!(titles(&state, 0), ["a", "final"]);
        assert_eq!(state.board.columns[0].tasks[1].id, 2);
    }

    #[test]
    fn edit_to_blank_title_is_a_silent_cancel() {
        let state = state_with(&[&["keep"], &[], &[]]);
        let mut keys = vec![Key::Char('e')];
        keys.extend(vec![Key::Backspace; 4]);
        keys.push(Key::Enter);
        let (state, effects) = press(state, &keys);
        assert_eq!(effects.last(), Some(&Effect::None));
        assert_eq!(state.mode, Mode::Browsing);
        assert_eq!(titles(&state, 0), ["keep"]);
        assert_eq!(state.error, None);
    }

    #[test]
    fn edit_target_is_resolved_by_id_at_commit() {
        let mut state = state_with(&[&["a", "b"], &[], &[]]);
        state.cursor.task = 1;
        let (mut state, _) = press(state, &[Key::Char('e')]);
        state.board.delete_task(0, 0).unwrap();
        let (state, _) = press(state, &[Key::Char('!'), Key::Enter]);
        assert_eq!(titles(&state, 0), ["b!"]);
        assert_eq!(state.cursor, Cursor::default());

        let mut gone = state_with(&[&["a"], &[], &[]]);
        gone.mode = Mode::Editing {
            target: TaskRef { column: 0, id: 99 },
            prompt: Prompt::insert("x"),
        };
        let (gone, effects) = press(gone, &[Key::Enter]);
        assert_eq!(effects, [Effect::None]);
        assert_eq!(gone.status, "Task #99 no longer exists");
        assert_eq!(titles(&gone, 0), ["a"]);
    }

    #[test]
    fn edit_and_delete_need_a_selected_task() {
        let state = AppState::new(Board::default());
        let (state, effects) = press(state, &[Key::Char('e'), Key::Char('d'), Key::Char(']')]);
        assert_eq!(state.mode, Mode::Browsing);
        assert_eq!(effects, [Effect::None; 3]);
    }

    #[test]
    fn confirm_dialog_is_modal() {
        let state = state_with(&[&["a", "b"], &[], &[]]);
        let (state, effects) = press(
            state,
            &[Key::Char('d'), Key::Down, Key::Char('q'), Key::Char('a'), Key::Enter, Key::Char(']')],
        );
        assert!(effects.iter().all(|e| *e == Effect::None));
        assert!(matches!(state.mode, Mode::ConfirmingDelete { .. }));
        assert_eq!(state.cursor, Cursor::default());
        assert_eq!(state.board.task_count(), 2);

        let (state, effects) = press(state, &[Key::Char('n')]);
        assert_eq!(effects, [Effect::None]);
        assert_eq!(state.mode, Mode::Browsing);
        assert_eq!(state.board.task_count(), 2);

        let (state, _) = press(state, &[Key::Char('d'), Key::Esc]);
        assert_eq!(state.mode, Mode::Browsing);
        assert_eq!(state.status, "Delete canceled");
    }

    #[test]
    fn deleting_last_task_clamps_cursor_down() {
        let mut state = state_with(&[&["a", "b", "c"], &[], &[]]);
        state.cursor.task = 2;
        let (state, _) = press(state, &[Key::Char('d'), Key::Char('Y')]);
        assert_eq!(titles(&state, 0), ["a", "b"]);
        assert_eq!(state.cursor, Cursor { column: 0, task: 1 });

        let (state, _) = press(state, &[Key::Up, Key::Char('d'), Key::Char('y')]);
        assert_eq!(titles(&state, 0), ["b"]);
        assert_eq!(state.cursor, Cursor { column: 0, task: 0 });

        let (state, _) = press(state, &[Key::Char('d'), Key::Char('y')]);
        assert_eq!(state.cursor, Cursor { column: 0, task: 0 });
        assert!(state.cursor.is_valid(&state.board));
    }

    #[test]
    fn move_follows_task_to_bottom_of_destination() {
        let mut state = state_with(&[&[], &["x", "y", "z"], &["done"]]);
        state.cursor = Cursor { column: 1, task: 1 };
        let (state, effects) = press(state, &[Key::Char('[')]);
        assert_eq!(effects, [Effect::Persist]);
        assert_eq!(state.cursor, Cursor { column: 0, task: 0 });
        assert_eq!(titles(&state, 1), ["x", "z"]);

        let (mut state, _) = press(state, &[Key::Char(']'), Key::Char(']')]);
        assert_eq!(titles(&state, 2), ["done", "y"]);
        assert_eq!(state.cursor, Cursor { column: 2, task: 1 });

        let (_, effects) = press(state.clone(), &[Key::Char('}')]);
        assert_eq!(effects, [Effect::None]);
        state.cursor = Cursor { column: 0, task: 0 };
        let (_, effects) = press(state, &[Key::Char('{')]);
        assert_eq!(effects, [Effect::None]);
    }

    #[test]
    fn help_toggle_and_quit() {
        let state = AppState::new(Board::default());
        let (state, effects) = press(state, &[Key::Char('?')]);
        assert!(!state.show_help);
        assert_eq!(effects, [Effect::None]);
        let (_, effects) = press(state, &[Key::Char('q')]);
        assert_eq!(effects, [Effect::Quit]);
    }

    #[test]
    fn interrupt_quits_from_any_mode() {
        let state = state_with(&[&["a"], &[], &[]]);
        for opener in [Key::Char('a'), Key::Char('e'), Key::Char('d')] {
            let (state, effects) = press(state.clone(), &[opener, Key::Interrupt]);
            assert_eq!(effects.last(), Some(&Effect::Quit));
            assert_eq!(state.mode, Mode::Browsing);
            assert_eq!(state.board.task_count(), 1);
        }
    }

    #[test]
    fn persist_failure_is_recorded_and_cleared_on_success() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let mut state = state_with(&[&["a"], &[], &[]]);

        persist(&mut state, &BoardLocation::new(blocker.join("board.json")));
        assert!(state.error.as_deref().unwrap_or_default().starts_with("Save failed"));

        persist(&mut state, &BoardLocation::new(dir.path().join("board.json")));
        assert_eq!(state.error, None);
    }
}
