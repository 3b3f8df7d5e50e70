//! Binary entry point: parse arguments, load configuration, wire up
//! [`taskloom::app::AppState`], then either dispatch one headless
//! subcommand or drop into the interactive goal/agent loop.

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use taskloom::app::AppState;
use taskloom::cli::Cli;
use taskloom::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    let mut app = AppState::init(settings).await?;

    match cli.command {
        Some(command) => {
            let output = app.run_command(command).await?;
            println!("{output}");
        }
        None => run_interactive(&mut app).await?,
    }

    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read one goal at a time from the terminal and run the orchestrator loop
/// to completion for each, until the user exits with Ctrl-D.
async fn run_interactive(app: &mut AppState) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("taskloom — describe what you want done, or Ctrl-D to exit.");

    loop {
        match editor.readline("goal> ") {
            Ok(line) => {
                let goal = line.trim();
                if goal.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(goal);
                app.run_interactive(goal).await?;
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
