use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lifelock",
    version,
    about = "Offline-first task and life tracker with redundant local storage",
    after_help = "\
NOTE:
  Data lives in $LIFELOCK_HOME, or ./.lifelock when unset.
  Run `lifelock init` before any other command.
  Set LIFELOCK_REMOTE_URL (and LIFELOCK_REMOTE_KEY) to sync with a PostgREST/Supabase backend.

EXIT CODES:
  0  Success
  1  Error (not initialized, validation, database, etc.)

STORAGE NOTES:
  Every task change is written to several independent slots; a save needs 3 of them.
  A dated backup file is exported to <data>/backups on every save.
  Records are written locally first and pushed to the remote store in the background."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory
    Init,

    /// Task management
    #[command(subcommand)]
    Task(TaskCommands),

    /// Scan every local slot for lost tasks and restore them
    Recover,

    /// Save the task list to every slot and export a backup file
    Backup,

    /// Synced records (time blocks, routines, trackers, ...)
    #[command(subcommand)]
    Record(RecordCommands),

    /// Remote synchronization
    #[command(subcommand)]
    Sync(SyncCommands),

    /// Derived statistics
    #[command(subcommand)]
    Stats(StatsCommands),

    /// Keep running, auto-saving periodically, until Ctrl-C
    #[command(after_help = "\
NOTE:
  Saves every `autosave_secs` (default 10) and once more on Ctrl-C.
  Pending records are pushed after the debounce window while running.")]
    Watch,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    Add {
        /// Task title
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// deep | light | morning
        #[arg(long, default_value = "deep")]
        kind: String,
        /// low | medium | high | urgent | critical
        #[arg(long, default_value = "medium")]
        priority: String,
    },
    /// List tasks, most urgent first
    List,
    /// Toggle task completion
    Toggle {
        /// Task ID or prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// Show a record (default document if never written)
    Get {
        /// tasks | time_blocks | morning_routine | alcohol_tracker | gamification | task_snapshot
        entity: String,
        /// Day (YYYY-MM-DD) or entity id; defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Write a record payload
    Put {
        entity: String,
        #[arg(long)]
        date: Option<String>,
        /// JSON payload
        #[arg(long)]
        data: String,
    },
    /// List records in a date range (default: last 7 days)
    List {
        entity: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Push every pending record now
    Now,
    /// Show local/pending counts and last sync time
    Status,
}

#[derive(Subcommand)]
pub enum StatsCommands {
    /// Completed/total tasks per day for a week
    Week {
        /// First day of the week (YYYY-MM-DD); defaults to 6 days ago
        #[arg(long)]
        date: Option<String>,
    },
    /// Consecutive days with a completed task
    Streak,
}
