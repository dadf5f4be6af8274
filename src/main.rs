mod app;
mod cli;
mod config;
mod keys;
mod model;
mod storage;
#[cfg(test)]
mod test_properties;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use log::{info, warn};
use model::Board;
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::{self, File};
use storage::{BoardLocation, StorageError};

fn main() -> Result<()> {
    let _args = cli::Cli::parse();
    let config = Config::from_env();
    init_logging(&config);

    let location = BoardLocation::new(config.board_path.clone());
    info!("taskboard starting with board {}", location.path.display());
    let state = load_state(&location)?;
    ui::run(state, &location)
}

// The terminal belongs to the board, so logs only ever go to a file.
fn init_logging(config: &Config) {
    let Some(path) = &config.log_path else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create(path) {
        let _ = WriteLogger::init(config.log_level, log_config, log_file);
    }
}

fn load_state(location: &BoardLocation) -> Result<app::AppState> {
    let fresh = !location.exists();
    let (board, load_error) = match storage::load_board(location) {
        Ok(board) => (board, None),
        Err(err) => {
            warn!("could not load board: {}", err);
            (Board::default(), Some(err))
        }
    };
    if fresh {
        storage::save_board(location, &board)
            .with_context(|| format!("creating board file {}", location.path.display()))?;
    }

    let mut state = app::AppState::new(board);
    state.status = format!("Loaded board from {}", location.path.display());
    if let Some(err) = load_error {
        state.error = Some(describe_load_error(&err));
    }
    Ok(state)
}

fn describe_load_error(err: &StorageError) -> String {
    match err {
        StorageError::Parse { .. } => format!("Board file is malformed, starting empty: {}", err),
        _ => format!("Could not load board, starting empty: {}", err),
    }
}
