//! Command-line surface, grounded in the `clap::Parser` + nested
//! `Subcommand` shape used by task-oriented CLIs in this corpus: a
//! top-level command enum with `task`/`session`/`sync` branches, plus a
//! bare invocation that drops into the interactive terminal mode.

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "taskloom",
    version,
    about = "Interactive multi-agent task harness driving a local LLM"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, global = true, env = "TASKLOOM_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Emit structured JSON logs instead of human-readable ones.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Task graph operations, usable without a live LLM.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Session lifecycle.
    #[command(subcommand)]
    Session(SessionCommand),

    /// Export tasks/dependencies, write SESSION_STATE.md, and commit `.tasks/`.
    Sync,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task.
    Create(TaskCreateArgs),
    /// List tasks, optionally filtered.
    List(TaskListArgs),
}

#[derive(Args, Debug)]
pub struct TaskCreateArgs {
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, default_value = "medium")]
    pub priority: String,
    #[arg(long = "type", default_value = "task")]
    pub task_type: String,
    #[arg(long, value_delimiter = ',')]
    pub blocked_by: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TaskListArgs {
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Start a new session, adopting any orphaned in-progress task.
    Start,
}
