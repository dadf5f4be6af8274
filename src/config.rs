//! Runtime settings: built-in defaults, overridden by environment variables.
//!
//! - `TASKBOARD_FILE`: board snapshot path (default `~/.kanban.json`)
//! - `TASKBOARD_LOG`: log level (default `info`)
//! - `TASKBOARD_LOG_FILE`: log file (default `taskboard.log` in the data dir)

use directories::{BaseDirs, ProjectDirs};
use log::LevelFilter;
use std::env;
use std::path::PathBuf;

pub const BOARD_FILE_ENV: &str = "TASKBOARD_FILE";
pub const LOG_LEVEL_ENV: &str = "TASKBOARD_LOG";
pub const LOG_FILE_ENV: &str = "TASKBOARD_LOG_FILE";

const BOARD_FILE_NAME: &str = ".kanban.json";
const LOG_FILE_NAME: &str = "taskboard.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub board_path: PathBuf,
    pub log_level: LevelFilter,
    pub log_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let board_path = var(BOARD_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_board_path);
        let log_level = var(LOG_LEVEL_ENV)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(LevelFilter::Info);
        let log_path = var(LOG_FILE_ENV)
            .map(PathBuf::from)
            .or_else(default_log_path);

        Config {
            board_path,
            log_level,
            log_path,
        }
    }
}

fn default_board_path() -> PathBuf {
    let home = BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(BOARD_FILE_NAME)
}

fn default_log_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "taskboard").map(|dirs| dirs.data_dir().join(LOG_FILE_NAME))
}
