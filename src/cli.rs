use clap::Parser;

/// The board takes no arguments; clap still provides `--help` and `--version`.
#[derive(Parser, Debug)]
#[command(
    name = "taskboard",
    version,
    about = "Three-column terminal task board",
    after_help = "Environment: TASKBOARD_FILE (board path, default ~/.kanban.json), \
                  TASKBOARD_LOG (log level), TASKBOARD_LOG_FILE (log path)"
)]
pub struct Cli {}
