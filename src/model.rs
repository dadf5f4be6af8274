use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

pub type TaskId = u64;

/// The board always holds exactly this many columns.
pub const COLUMN_COUNT: usize = 3;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: u32,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tasks: Vec<Task>,
}

/// Three fixed columns of tasks.
///
/// `last_id` is never written to disk: deserializing a board recomputes it
/// from the highest task id present.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(try_from = "BoardSnapshot")]
pub struct Board {
    pub columns: [Column; COLUMN_COUNT],
    #[serde(skip)]
    last_id: TaskId,
}

#[derive(Deserialize)]
struct BoardSnapshot {
    columns: Vec<Column>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BoardError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("no task at index {index} in column {column}")]
    IndexOutOfRange { column: usize, index: usize },
    #[error("column index {0} is out of range")]
    ColumnOutOfRange(usize),
    #[error("task is already in column {0}")]
    SameColumn(usize),
    #[error("board must hold exactly {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },
    #[error("task id {0} is used more than once")]
    DuplicateId(TaskId),
}

impl Default for Board {
    fn default() -> Self {
        Board {
            columns: [
                Column::new(1, "To Do"),
                Column::new(2, "In Progress"),
                Column::new(3, "Done"),
            ],
            last_id: 0,
        }
    }
}

// The id counter is derived from the tasks, so it does not take part in equality.
impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl TryFrom<BoardSnapshot> for Board {
    type Error = BoardError;

    fn try_from(snapshot: BoardSnapshot) -> Result<Self, Self::Error> {
        let found = snapshot.columns.len();
        let columns: [Column; COLUMN_COUNT] = snapshot
            .columns
            .try_into()
            .map_err(|_| BoardError::ColumnCount {
                expected: COLUMN_COUNT,
                found,
            })?;
        let mut seen = HashSet::new();
        if let Some(task) = columns
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|t| !seen.insert(t.id))
        {
            return Err(BoardError::DuplicateId(task.id));
        }
        Ok(Board::from_columns(columns))
    }
}

impl Column {
    pub fn new(id: u32, title: impl Into<String>) -> Self {
        Column {
            id,
            title: title.into(),
            tasks: Vec::new(),
        }
    }
}

impl Board {
    pub fn from_columns(columns: [Column; COLUMN_COUNT]) -> Self {
        let last_id = columns
            .iter()
            .flat_map(|c| c.tasks.iter())
            .map(|t| t.id)
            .max()
            .unwrap_or(0);
        Board { columns, last_id }
    }

    pub fn last_id(&self) -> TaskId {
        self.last_id
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn column_len(&self, column: usize) -> usize {
        self.columns.get(column).map(|c| c.tasks.len()).unwrap_or(0)
    }

    pub fn task(&self, column: usize, index: usize) -> Option<&Task> {
        self.columns.get(column)?.tasks.get(index)
    }

    pub fn position_of(&self, column: usize, id: TaskId) -> Option<usize> {
        self.columns.get(column)?.tasks.iter().position(|t| t.id == id)
    }

    /// Appends a new task to the bottom of `column`.
    pub fn add_task(&mut self, column: usize, title: &str) -> Result<&Task, BoardError> {
        let title = validate_title(title)?;
        if column >= COLUMN_COUNT {
            return Err(BoardError::ColumnOutOfRange(column));
        }
        self.last_id += 1;
        let task = Task {
            id: self.last_id,
            title,
            description: String::new(),
            created_at: Utc::now(),
        };
        let tasks = &mut self.columns[column].tasks;
        tasks.push(task);
        Ok(&tasks[tasks.len() - 1])
    }

    pub fn delete_task(&mut self, column: usize, index: usize) -> Result<Task, BoardError> {
        let tasks = self.tasks_mut(column)?;
        if index >= tasks.len() {
            return Err(BoardError::IndexOutOfRange { column, index });
        }
        Ok(tasks.remove(index))
    }

    /// Replaces the title in place; id and creation time are untouched.
    pub fn edit_task(&mut self, column: usize, index: usize, title: &str) -> Result<(), BoardError> {
        let title = validate_title(title)?;
        let task = self
            .tasks_mut(column)?
            .get_mut(index)
            .ok_or(BoardError::IndexOutOfRange { column, index })?;
        task.title = title;
        Ok(())
    }

    /// Moves a task to the bottom of `to` and returns its new index there.
    pub fn move_task(&mut self, from: usize, index: usize, to: usize) -> Result<usize, BoardError> {
        if to >= COLUMN_COUNT {
            return Err(BoardError::ColumnOutOfRange(to));
        }
        if from == to {
            return Err(BoardError::SameColumn(from));
        }
        let task = self.delete_task(from, index)?;
        let dest = &mut self.columns[to].tasks;
        dest.push(task);
        Ok(dest.len() - 1)
    }

    fn tasks_mut(&mut self, column: usize) -> Result<&mut Vec<Task>, BoardError> {
        self.columns
            .get_mut(column)
            .map(|c| &mut c.tasks)
            .ok_or(BoardError::ColumnOutOfRange(column))
    }
}

fn validate_title(title: &str) -> Result<String, BoardError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(BoardError::InvalidInput("task title must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Task>>::deserialize(deserializer)?.unwrap_or_default())
}
