use clap::Parser;
use colored::Colorize;
use questline::cli::{Cli, Command};
use questline::core::store::Store;
use questline::plugins::{activity, ledger, progression, tasks};
use questline::subsystems;
use std::path::PathBuf;

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        if e.is_retryable() {
            eprintln!("{}", "the operation can be retried".bright_yellow());
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), questline::core::error::QuestlineError> {
    let root = resolve_store_root(cli.dir)?;
    std::fs::create_dir_all(&root).map_err(questline::core::error::QuestlineError::IoError)?;
    let store = Store::at(root);

    match cli.command {
        Command::Init => {
            subsystems::initialize_all_dbs(&store.root)?;
            println!("Store initialized at {}", store.root.display());
        }
        Command::Ledger(args) => ledger::run_ledger_cli(&store, args)?,
        Command::Progression(args) => progression::run_progression_cli(&store, args)?,
        Command::Tasks(args) => tasks::run_tasks_cli(&store, args)?,
        Command::Activity(args) => activity::run_activity_cli(&store, args)?,
        Command::Capabilities => {
            let caps = serde_json::json!({
                "subsystems": [
                    ledger::schema(),
                    progression::schema(),
                    tasks::schema(),
                    activity::schema(),
                ]
            });
            println!("{}", serde_json::to_string_pretty(&caps).unwrap());
        }
    }
    Ok(())
}

fn resolve_store_root(
    dir: Option<PathBuf>,
) -> Result<PathBuf, questline::core::error::QuestlineError> {
    if let Some(dir) = dir {
        return Ok(dir);
    }
    if let Ok(env_dir) = std::env::var("QUESTLINE_DATA") {
        if !env_dir.trim().is_empty() {
            return Ok(PathBuf::from(env_dir));
        }
    }
    Ok(PathBuf::from(".questline").join("data"))
}
