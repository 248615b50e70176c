use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::models::{Category, Priority, RepeatType, RepeatValue, Task, ViewEntry};
use crate::store::{StoreError, TaskStore};
use crate::utils::parse_date;

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "Local task list with today, overdue and inbox views")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less log output (-q error only)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Due time, free form (e.g. 18:30)
        #[arg(long)]
        time: Option<String>,
        /// Category name
        #[arg(long)]
        group: Option<String>,
        /// Priority 1 (low) to 4 (urgent)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        priority: Option<u8>,
        /// Free-text note
        #[arg(long)]
        note: Option<String>,
        /// Repeat: none, daily, weekly or monthly
        #[arg(long, default_value = "none")]
        repeat: RepeatType,
        /// Repeat interval or anchor
        #[arg(long)]
        repeat_value: Option<String>,
    },
    /// Bulk-save tasks from a JSON array, then resync every view
    Import {
        /// Path to a JSON file holding an array of tasks
        file: PathBuf,
    },
    /// Toggle a task between open and completed
    Complete { id: i64 },
    /// Toggle a task's archived flag
    Archive { id: i64 },
    /// Open tasks due today
    Today,
    /// Open tasks whose due date has passed
    Overdue {
        /// Read the stored overdue view without rebuilding it
        #[arg(long)]
        cached: bool,
    },
    /// Every open task
    Inbox,
    /// Tasks in one category
    Group {
        name: String,
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// List categories
    Categories,
    /// Add or update a category
    AddCategory {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// Rebuild every view from the task table
    Sync,
    /// Report views that disagree with the task table
    Check,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Failed to read {path}: {message}")]
    ImportError { path: String, message: String },
    #[error("Failed to encode output: {0}")]
    OutputError(#[from] serde_json::Error),
    #[error("Invalid log filter: {0}")]
    LogFilterError(String),
}

/// Install the stderr tracing subscriber. RUST_LOG wins, then -v/-q, then
/// the configured level.
pub fn init_tracing(verbose: u8, quiet: u8, configured: &str) -> Result<(), CliError> {
    let level = if quiet >= 1 {
        "error"
    } else {
        match verbose {
            0 => configured,
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::LogFilterError(e.to_string()))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        tracing::debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Dispatch a parsed subcommand against the store
pub fn run_command(command: Commands, store: &TaskStore, json: bool) -> Result<(), CliError> {
    match command {
        Commands::Add { title, due, time, group, priority, note, repeat, repeat_value } => {
            let mut task = Task::new(title);
            task.due_date = validate_due(due)?;
            task.due_time = time;
            task.group = group;
            task.priority = priority.and_then(|p| Priority::try_from(p).ok());
            task.note = note;
            task.repeat_type = repeat;
            task.repeat_value = repeat_value.map(parse_repeat_value);
            handle_add_task(task, store, json)
        }
        Commands::Import { file } => handle_import(&file, store, json),
        Commands::Complete { id } => {
            let outcome = store.toggle_complete(id)?;
            match (&outcome, json) {
                (_, true) => print_json(&outcome),
                (Some(o), false) => {
                    let state = if o.completed { "completed" } else { "reopened" };
                    println!("Task {} {}", o.task_id, state);
                    Ok(())
                }
                (None, false) => {
                    println!("No task with ID {}", id);
                    Ok(())
                }
            }
        }
        Commands::Archive { id } => {
            let archived = store.toggle_archive(id)?;
            match (archived, json) {
                (_, true) => print_json(&archived),
                (Some(true), false) => {
                    println!("Task {} archived", id);
                    Ok(())
                }
                (Some(false), false) => {
                    println!("Task {} unarchived", id);
                    Ok(())
                }
                (None, false) => {
                    println!("No task with ID {}", id);
                    Ok(())
                }
            }
        }
        Commands::Today => print_entries(&store.load_today()?, json),
        Commands::Overdue { cached } => {
            if !cached {
                store.rebuild_overdue()?;
            }
            print_entries(&store.load_overdue_from_store()?, json)
        }
        Commands::Inbox => print_entries(&store.load_active()?, json),
        Commands::Group { name, all } => {
            let tasks = if all {
                store.query_all_by_group(&name)?
            } else {
                store.query_by_group(&name)?
            };
            print_tasks(&tasks, json)
        }
        Commands::Categories => {
            let categories = store.load_categories()?;
            if json {
                return print_json(&categories);
            }
            for category in &categories {
                let archived = if category.archived { " (archived)" } else { "" };
                match &category.color {
                    Some(color) => println!("{} [{}]{}", category.name, color, archived),
                    None => println!("{}{}", category.name, archived),
                }
            }
            Ok(())
        }
        Commands::AddCategory { name, color } => {
            let mut category = Category::new(name);
            category.color = color;
            store.save_categories(std::slice::from_ref(&category))?;
            if json {
                return print_json(&category);
            }
            println!("Category '{}' saved", category.name);
            Ok(())
        }
        Commands::Sync => {
            let report = store.sync_views()?;
            if json {
                return print_json(&report);
            }
            println!(
                "Views synced: {} today, {} overdue, {} open",
                report.today, report.overdue, report.active
            );
            Ok(())
        }
        Commands::Check => {
            let drifts = store.check_consistency()?;
            if json {
                return print_json(&drifts);
            }
            if drifts.is_empty() {
                println!("All views consistent");
            }
            for drift in &drifts {
                println!("{}", drift);
            }
            Ok(())
        }
    }
}

fn validate_due(due: Option<String>) -> Result<Option<String>, CliError> {
    match due {
        Some(due_str) => {
            parse_date(&due_str)
                .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", due_str, e)))?;
            Ok(Some(due_str))
        }
        None => Ok(None),
    }
}

fn parse_repeat_value(raw: String) -> RepeatValue {
    match raw.parse::<i64>() {
        Ok(n) => RepeatValue::Number(n),
        Err(_) => RepeatValue::Text(raw),
    }
}

/// Handle the add command: save the task and bring the views up to date
pub fn handle_add_task(task: Task, store: &TaskStore, json: bool) -> Result<(), CliError> {
    let ids = store.save(std::slice::from_ref(&task))?;
    store.sync_views()?;
    let id = ids.first().copied().unwrap_or_default();
    if json {
        return print_json(&store.get(id)?);
    }
    println!("Task created successfully (ID: {})", id);
    Ok(())
}

/// Handle the import command: bulk save, then one explicit sync
pub fn handle_import(file: &Path, store: &TaskStore, json: bool) -> Result<(), CliError> {
    let import_error = |message: String| CliError::ImportError {
        path: file.display().to_string(),
        message,
    };
    let contents = std::fs::read_to_string(file).map_err(|e| import_error(e.to_string()))?;
    let tasks: Vec<Task> = serde_json::from_str(&contents).map_err(|e| import_error(e.to_string()))?;
    for task in &tasks {
        if let Some(due) = &task.due_date {
            if !due.trim().is_empty() {
                validate_due(Some(due.clone()))?;
            }
        }
    }

    let ids = store.save(&tasks)?;
    let report = store.sync_views()?;
    if json {
        return print_json(&ids);
    }
    println!(
        "Imported {} tasks ({} today, {} overdue, {} open)",
        ids.len(),
        report.today,
        report.overdue,
        report.active
    );
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_entries(entries: &[ViewEntry], json: bool) -> Result<(), CliError> {
    if json {
        return print_json(entries);
    }
    if entries.is_empty() {
        println!("Nothing here");
    }
    for entry in entries {
        println!(
            "{:>4}  {}{}{}",
            entry.task_id,
            entry.title,
            entry.due_date.as_deref().map(|d| format!("  due {}", d)).unwrap_or_default(),
            entry.group.as_deref().map(|g| format!("  [{}]", g)).unwrap_or_default()
        );
    }
    Ok(())
}

fn print_tasks(tasks: &[Task], json: bool) -> Result<(), CliError> {
    if json {
        return print_json(tasks);
    }
    if tasks.is_empty() {
        println!("Nothing here");
    }
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        println!(
            "[{}] {:>4}  {}{}",
            mark,
            task.id.unwrap_or_default(),
            task.title,
            task.due_date.as_deref().map(|d| format!("  due {}", d)).unwrap_or_default()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::utils::FixedClock;
    use chrono::NaiveDate;

    fn store() -> TaskStore {
        let today = NaiveDate::from_ymd_opt(2024, 1, 5).expect("date");
        TaskStore::new(Database::open_in_memory().expect("open db"), FixedClock(today))
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["daybook", "overdue", "--cached", "--json", "-vv"])
            .expect("parse");
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Overdue { cached: true }));
    }

    #[test]
    fn priority_outside_range_is_rejected() {
        assert!(Cli::try_parse_from(["daybook", "add", "x", "--priority", "5"]).is_err());
    }

    #[test]
    fn add_rejects_malformed_due_date() {
        let store = store();
        let command = Commands::Add {
            title: "Pay rent".to_string(),
            due: Some("01/05/2024".to_string()),
            time: None,
            group: None,
            priority: None,
            note: None,
            repeat: RepeatType::None,
            repeat_value: None,
        };
        assert!(matches!(run_command(command, &store, false), Err(CliError::DateParseError(_))));
        assert!(store.compute_overdue_set().expect("scan").is_empty());
    }

    #[test]
    fn import_saves_and_syncs_views() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tasks.json");
        std::fs::write(
            &path,
            r#"[{"title":"Pay rent","dueDate":"2024-01-01"},{"title":"Call mom","dueDate":"2024-01-05","group":"Home"}]"#,
        )
        .expect("write import");

        let store = store();
        run_command(Commands::Import { file: path }, &store, true).expect("import");

        assert_eq!(store.load_overdue_from_store().expect("overdue").len(), 1);
        assert_eq!(store.load_today().expect("today").len(), 1);
        assert_eq!(store.load_active().expect("active").len(), 2);
    }

    #[test]
    fn repeat_values_parse_numbers_first() {
        assert_eq!(parse_repeat_value("3".to_string()), RepeatValue::Number(3));
        assert_eq!(
            parse_repeat_value("mon,wed".to_string()),
            RepeatValue::Text("mon,wed".to_string())
        );
    }
}
