use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use duetask_core::config::{default_config_path, save_config};
use duetask_core::db::open_db;
use duetask_core::{
    default_log_level, format_due_date, init_logging, load_config, parse_due_date, surface_for,
    Config, DueDateEngine, SchedulerHandle, SharedSurface, SqliteTaskStore, Task, TaskId,
    TaskService,
};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "duetask", version, about = "Local todo tracker with due-date reminders")]
struct Cli {
    /// Config file (defaults to ~/.duetask/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reminder scheduler until interrupted (Ctrl-C)
    Run,

    /// Run a single reminder cycle and print what was sent
    Check,

    /// Create a task
    Add {
        #[arg(long)]
        title: String,

        /// Due date: `YYYY-MM-DD` or `YYYY-MM-DD HH:MM` (local time)
        #[arg(long)]
        due: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List all tasks, soonest due first
    List,

    /// Edit a task; changing the due date re-arms its reminders
    Update {
        id: TaskId,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        due: Option<String>,
    },

    /// Delete a task
    Delete { id: TaskId },

    /// Config file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file (fails if one exists)
    Init,

    /// Print the effective config
    Show,
}

type Store = Arc<SqliteTaskStore>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    if let Command::Config { command } = &cli.command {
        return run_config_command(command, &config_path);
    }

    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    setup_logging(&config)?;

    let store = open_store(&config)?;
    let surface = surface_for(config.notifications.backend);

    match cli.command {
        Command::Run => run_scheduler(store, surface, &config).await?,
        Command::Check => check_once(store, surface)?,
        Command::Add {
            title,
            due,
            description,
        } => {
            let due = parse_due_date(&due, &Local)?;
            let task = service(store, surface, &config).create_task(&title, &description, due)?;
            println!("Created {}", task.id);
            print_task(&task);
        }
        Command::List => {
            let tasks = service(store, surface, &config).list_tasks()?;
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in &tasks {
                print_task(task);
            }
        }
        Command::Update {
            id,
            title,
            description,
            due,
        } => {
            let service = service(store, surface, &config);
            let current = service
                .get_task(id)?
                .ok_or_else(|| anyhow!("task not found: {id}"))?;
            let due = match due {
                Some(raw) => parse_due_date(&raw, &Local)?,
                None => current.date_due,
            };
            let task = service.update_task(
                id,
                title.as_deref().unwrap_or(&current.title),
                description.as_deref().unwrap_or(&current.description),
                due,
            )?;
            println!("Updated {}", task.id);
            print_task(&task);
        }
        Command::Delete { id } => {
            service(store, surface, &config).delete_task(id)?;
            println!("Deleted {id}");
        }
        Command::Config { .. } => {}
    }

    Ok(())
}

fn run_config_command(command: &ConfigCommand, path: &Path) -> Result<()> {
    match command {
        ConfigCommand::Init => {
            if path.exists() {
                bail!("config already exists: {}", path.display());
            }
            save_config(path, &Config::default())?;
            println!("Wrote {}", path.display());
        }
        ConfigCommand::Show => {
            let config =
                load_config(path).with_context(|| format!("loading {}", path.display()))?;
            let raw = toml::to_string_pretty(&config).context("rendering config")?;
            println!("# {}", path.display());
            print!("{raw}");
        }
    }
    Ok(())
}

fn setup_logging(config: &Config) -> Result<()> {
    let level = config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    let log_dir = config.log_dir()?;
    init_logging(&level, &log_dir).context("initializing logging")
}

fn open_store(config: &Config) -> Result<Store> {
    let db_path = config.db_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let conn = open_db(&db_path).with_context(|| format!("opening {}", db_path.display()))?;
    Ok(Arc::new(SqliteTaskStore::new(conn)))
}

fn service(store: Store, surface: SharedSurface, config: &Config) -> TaskService<Store, SharedSurface> {
    TaskService::new(store, surface).with_confirmations(config.notifications.crud_confirmations)
}

async fn run_scheduler(store: Store, surface: SharedSurface, config: &Config) -> Result<()> {
    let engine = Arc::new(DueDateEngine::new(store, surface));
    let handle = SchedulerHandle::start(engine, config.scheduler_options());
    println!(
        "Checking due dates every {} min. Press Ctrl-C to stop.",
        config.scheduler.check_interval_minutes
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!(
        "event=cli_shutdown module=cli status=ok completed_cycles={} failed_cycles={}",
        handle.completed_cycles(),
        handle.failed_cycles()
    );
    handle.stop().await;
    Ok(())
}

fn check_once(store: Store, surface: SharedSurface) -> Result<()> {
    let engine = DueDateEngine::new(store, surface);
    let report = engine.run_cycle(&Local::now())?;
    println!(
        "Scanned {} | due today: {} | due tomorrow: {} | surface failures: {} | flag write failures: {}",
        report.scanned,
        report.due_today,
        report.due_tomorrow,
        report.surface_failures,
        report.flag_write_failures
    );
    Ok(())
}

fn print_task(task: &Task) {
    let mut sent = Vec::new();
    if task.notification_sent_today {
        sent.push("today");
    }
    if task.notification_sent_tomorrow {
        sent.push("tomorrow");
    }
    println!(
        "{} | due {} | {} | reminded: {}",
        task.id,
        format_due_date(task.date_due, &Local),
        task.title,
        if sent.is_empty() { "-".to_string() } else { sent.join(", ") }
    );
    if !task.description.is_empty() {
        println!("    {}", task.description);
    }
}
