//! Command-line front end over the core composition root.
//!
//! # Responsibility
//! - Exercise `daybook_core` stores against a real database file.
//! - Keep output deterministic, one record per line.

use clap::{Parser, Subcommand};
use daybook_core::{
    init_logging, AppContext, ClassList, ClassListApplier, LogTarget, NewTask, StoreConfig,
    SystemTheme, SystemThemeSource, TaskPriority, TaskStatus, ThemeController, ThemePreference,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(name = "daybook", version, about = "Daybook storage command line")]
struct Args {
    /// JSON config file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite database file (in-memory when omitted)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Absolute directory for rotating log files (stderr when omitted)
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print core health and version
    Ping,
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TaskCommand),
    /// Show or change the theme preference
    #[command(subcommand)]
    Theme(ThemeCommand),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Tasks(_) => "tasks",
            Self::Theme(_) => "theme",
        }
    }
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    List,
    Add {
        title: String,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<TaskPriority>,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
    },
    Done {
        id: String,
    },
    Remove {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ThemeCommand {
    /// Print stored preference and the theme it resolves to
    Show {
        /// Simulated system theme
        #[arg(long, default_value = "light", value_parser = parse_system_theme)]
        system: SystemTheme,
    },
    Set {
        #[arg(value_parser = parse_preference)]
        preference: ThemePreference,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let mut config = match args.config.as_ref() {
        Some(path) => StoreConfig::load(path).map_err(|err| err.to_string())?,
        None => StoreConfig::default(),
    };
    if args.db.is_some() {
        config.db_path = args.db;
    }
    if args.log_dir.is_some() {
        config.log_dir = args.log_dir;
    }

    let (level, target) = match config.log_dir.clone() {
        Some(dir) => (config.log_level.as_str(), LogTarget::Directory(dir)),
        None => ("warn", LogTarget::Stderr),
    };
    init_logging(level, target)?;

    let app = AppContext::open(&config);
    if !app.handle().is_available() {
        eprintln!("warning: durable storage unavailable; changes will not be saved");
    }

    info!(
        "event=cli_command module=cli status=start command={}",
        args.command.name()
    );
    match args.command {
        Command::Ping => {
            println!("daybook_core ping={}", daybook_core::ping());
            println!("daybook_core version={}", daybook_core::core_version());
        }
        Command::Tasks(command) => run_tasks(&app, command)?,
        Command::Theme(command) => run_theme(&app, command),
    }

    app.close().map_err(|err| err.to_string())
}

fn run_tasks(app: &AppContext, command: TaskCommand) -> Result<(), String> {
    let tasks = app.tasks().map_err(|err| err.to_string())?;
    match command {
        TaskCommand::List => {
            for task in tasks.store().list() {
                println!(
                    "{}\t{:?}\t{:?}\t{}\t{}",
                    task.id,
                    task.status,
                    task.priority,
                    task.due_date.as_deref().unwrap_or("-"),
                    task.title
                );
            }
        }
        TaskCommand::Add {
            title,
            priority,
            due,
        } => {
            let task = tasks
                .create_task(NewTask {
                    title,
                    description: None,
                    priority: priority.unwrap_or_default(),
                    due_date: due,
                })
                .map_err(|err| err.to_string())?;
            println!("{}", task.id);
        }
        TaskCommand::Done { id } => {
            tasks
                .set_status(&id, TaskStatus::Done)
                .map_err(|err| err.to_string())?;
        }
        TaskCommand::Remove { id } => {
            tasks.delete_task(&id).map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}

fn run_theme(app: &AppContext, command: ThemeCommand) {
    match command {
        ThemeCommand::Show { system } => {
            let root = Rc::new(ClassList::new());
            let controller = ThemeController::mount(
                app.theme_preference(),
                Rc::new(SystemThemeSource::new(system)),
                Rc::new(ClassListApplier::new(Rc::clone(&root))),
            );
            println!(
                "preference={} effective={} classes={}",
                controller.preference(),
                controller.effective().as_str(),
                root.classes().join(",")
            );
        }
        ThemeCommand::Set { preference } => {
            app.theme_preference().set(preference);
            println!("preference={preference}");
        }
    }
}

fn parse_priority(value: &str) -> Result<TaskPriority, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        other => Err(format!(
            "unsupported priority `{other}`; expected low|medium|high"
        )),
    }
}

fn parse_system_theme(value: &str) -> Result<SystemTheme, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "light" => Ok(SystemTheme::Light),
        "dark" => Ok(SystemTheme::Dark),
        other => Err(format!(
            "unsupported system theme `{other}`; expected light|dark"
        )),
    }
}

fn parse_preference(value: &str) -> Result<ThemePreference, String> {
    value.parse()
}
