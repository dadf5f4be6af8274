use crate::model::Board;
use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLocation {
    pub path: PathBuf,
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("reading {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("serializing board: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("writing {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl BoardLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        BoardLocation { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Reads the snapshot at `location`. A missing file is not an error: the
/// default three-column board is returned instead.
pub fn load_board(location: &BoardLocation) -> Result<Board, StorageError> {
    if !location.exists() {
        debug!("no board at {}, starting empty", location.path.display());
        return Ok(Board::default());
    }
    let data = fs::read_to_string(&location.path).map_err(|source| StorageError::Read {
        path: location.path.clone(),
        source,
    })?;
    let board: Board = serde_json::from_str(&data).map_err(|source| StorageError::Parse {
        path: location.path.clone(),
        source,
    })?;
    info!(
        "loaded {} tasks (last id {}) from {}",
        board.task_count(),
        board.last_id(),
        location.path.display()
    );
    Ok(board)
}

/// Replaces the whole snapshot file with the current board.
pub fn save_board(location: &BoardLocation, board: &Board) -> Result<(), StorageError> {
    let serialized = serde_json::to_string_pretty(board)?;
    write_replacing(&location.path, &serialized).map_err(|source| StorageError::Write {
        path: location.path.clone(),
        source,
    })?;
    debug!(
        "saved {} tasks to {}",
        board.task_count(),
        location.path.display()
    );
    Ok(())
}

fn write_replacing(path: &Path, contents: &str) -> io::Result<()> {
    // Replace the file a symlink points at, not the link itself.
    let target = if path.exists() {
        fs::canonicalize(path)?
    } else {
        path.to_path_buf()
    };
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let result = fs::write(&tmp, contents).and_then(|()| fs::rename(&tmp, &target));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
