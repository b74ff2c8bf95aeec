use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result};
use std::path::PathBuf;
use tasklist::{
    Backend, BackendKind, CategoryFilter, Config, Filter, Priority, StatusFilter, Task, TaskStore, prefs,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "tasklist")]
#[command(about = "Ordered task list with categories, due dates and local persistence")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <config dir>/tasklist/tasklist.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the stored task list
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend: file or sqlite
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task at the end of the list
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        #[arg(short, long, default_value = tasklist::models::DEFAULT_CATEGORY)]
        category: String,

        /// Due date as YYYY-MM-DD (default: today)
        #[arg(short, long, value_parser = parse_due_date, conflicts_with = "no_due")]
        due: Option<String>,

        /// Leave the task without a due date
        #[arg(long)]
        no_due: bool,
    },

    /// Show tasks, optionally filtered
    List {
        /// all, active or completed
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,

        /// A category name or "all"
        #[arg(short, long, default_value = "all")]
        category: CategoryFilter,
    },

    /// Mark a task done, or undone if it already is
    Toggle { id: i64 },

    /// Replace a task's text
    Edit {
        id: i64,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Delete a task
    Delete { id: i64 },

    /// Move a task to the position of another task
    Move { source: i64, target: i64 },

    /// Sort the list by due date, undated tasks first
    Sort,

    /// Delete all completed tasks
    ClearCompleted,

    /// Show how many tasks remain
    Count,

    /// List the categories in use
    Categories,

    /// Show the display theme, or flip it with --toggle
    Theme {
        #[arg(long)]
        toggle: bool,
    },
}

fn parse_due_date(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

/// Due date for a new task: the given one, none with `--no-due`, else today
fn resolve_due(due: Option<String>, no_due: bool, today: NaiveDate) -> Option<String> {
    if no_due {
        return None;
    }
    Some(due.unwrap_or_else(|| today.format("%Y-%m-%d").to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?.with_overrides(cli.data_dir, cli.backend);
    let backend = config.open_backend()?;

    let mut store =
        TaskStore::open_with_key(backend, &config.tasks_key).context("Failed to open task store")?;

    match cli.command {
        Commands::Add {
            text,
            priority,
            category,
            due,
            no_due,
        } => {
            let due = resolve_due(due, no_due, Local::now().date_naive());
            match store.add(&text.join(" "), priority, &category, due.as_deref()) {
                Some(task) => {
                    println!("Added task {}", task.id.to_string().cyan());
                    render(&store, &Filter::default());
                }
                None => note("Nothing added: task text is empty or no id is left"),
            }
        }
        Commands::List { status, category } => {
            render(&store, &Filter { status, category });
        }
        Commands::Toggle { id } => match store.toggle(id) {
            Some(true) => {
                println!("{}", "Task completed! Nice work.".green().bold());
                render(&store, &Filter::default());
            }
            Some(false) => {
                println!("Task {} reopened", id);
                render(&store, &Filter::default());
            }
            None => note(&format!("No task with id {}", id)),
        },
        Commands::Edit { id, text } => {
            if store.edit(id, &text.join(" ")) {
                render(&store, &Filter::default());
            } else {
                note("Nothing changed");
            }
        }
        Commands::Delete { id } => match store.delete(id) {
            Some(task) => {
                println!("Deleted \"{}\"", task.text);
                render(&store, &Filter::default());
            }
            None => note(&format!("No task with id {}", id)),
        },
        Commands::Move { source, target } => {
            if store.reorder(source, target) {
                render(&store, &Filter::default());
            } else {
                note("Nothing moved: both ids must exist and differ");
            }
        }
        Commands::Sort => {
            store.sort_by_due_date();
            render(&store, &Filter::default());
        }
        Commands::ClearCompleted => {
            let removed = store.clear_completed();
            println!("Removed {} completed task(s)", removed);
            render(&store, &Filter::default());
        }
        Commands::Count => println!("{}", store.count()),
        Commands::Categories => {
            for category in store.categories() {
                println!("{}", category);
            }
        }
        Commands::Theme { toggle } => run_theme(config.open_backend()?, toggle)?,
    }

    if let Some(e) = store.take_save_error() {
        eprintln!("{} {:#}", "warning:".yellow().bold(), e);
        eprintln!("{}", "Changes were not saved and will be lost on exit.".yellow());
    }

    Ok(())
}

fn run_theme<B: Backend>(mut backend: B, toggle: bool) -> Result<()> {
    let mode = if toggle {
        prefs::toggle_theme(&mut backend)?
    } else {
        prefs::load_theme(&backend)?
    };
    println!("Theme: {}", mode);
    Ok(())
}

fn note(message: &str) {
    eprintln!("{}", message.yellow());
}

fn render<B: Backend>(store: &TaskStore<B>, filter: &Filter) {
    let tasks = store.filter_by(filter);

    if tasks.is_empty() {
        println!("{}", filter.empty_message().dimmed());
    } else {
        for task in &tasks {
            println!("{}", format_task(task));
        }
    }

    println!("{}", store.count().to_string().bold());
}

fn format_task(task: &Task) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let text = if task.completed {
        task.text.strikethrough().dimmed().to_string()
    } else {
        task.text.clone()
    };
    let priority = match task.priority {
        Priority::High => "high".red(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".green(),
    };
    let due = task.due_date.as_deref().unwrap_or("No due date");

    format!(
        "{} {} {}  {} {} {}",
        check,
        task.id.to_string().dimmed(),
        text,
        priority,
        format!("#{}", task.category).blue(),
        due.dimmed()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_resolve_due_defaults_to_today() {
        assert_eq!(resolve_due(None, false, day("2024-01-05")).as_deref(), Some("2024-01-05"));
    }

    #[test]
    fn test_resolve_due_explicit_and_none() {
        let today = day("2024-01-05");
        assert_eq!(
            resolve_due(Some("2024-02-01".to_string()), false, today).as_deref(),
            Some("2024-02-01")
        );
        assert_eq!(resolve_due(None, true, today), None);
    }

    #[test]
    fn test_parse_due_date() {
        assert_eq!(parse_due_date(" 2024-01-10 ").unwrap(), "2024-01-10");
        assert!(parse_due_date("10/01/2024").is_err());
    }

    #[test]
    fn test_cli_add_flags() {
        let cli = Cli::try_parse_from(["tasklist", "add", "Buy", "milk", "--no-due"]).unwrap();
        match cli.command {
            Commands::Add { text, due, no_due, .. } => {
                assert_eq!(text, vec!["Buy", "milk"]);
                assert_eq!(due, None);
                assert!(no_due);
            }
            _ => panic!("expected add"),
        }

        assert!(Cli::try_parse_from(["tasklist", "add", "x", "-d", "2024-01-01", "--no-due"]).is_err());
    }

    #[test]
    fn test_cli_theme_dispatch_parses() {
        let cli = Cli::try_parse_from(["tasklist", "theme", "--toggle"]).unwrap();
        assert!(matches!(cli.command, Commands::Theme { toggle: true }));
    }
}
