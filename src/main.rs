// Module declarations
mod cli;
mod commands;
mod config;
mod console;
mod display;
mod error;
mod listing;
mod series;
mod store;
mod volumes;

use clap::Parser;
use tracing::Level;

use crate::cli::{Cli, Command, ConfigAction};
use crate::config::load_config;
use crate::console::Console;
use crate::error::TrackerError;

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose, cli.quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = load_config(&cli.config)?;
    let mut console = Console::stdio();

    let outcome = match cli.command {
        Command::Init => commands::init(&config, &mut console),
        Command::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&config, &mut console),
            ConfigAction::Set { key, value } => {
                commands::config_set(&cli.config, &mut config, &mut console, &key, &value)
            }
            ConfigAction::Reset => commands::config_reset(&cli.config, &mut config, &mut console),
        },
        Command::ClearDb { yes } => commands::clear_db(&config, &mut console, yes),
        command => commands::open_store(&config).and_then(|store| match command {
            Command::Add(args) => commands::add(&store, &config, &mut console, args),
            Command::List { filter, order } => {
                commands::list(&store, &config, &mut console, filter, order.into())
            }
            Command::Search { term } => commands::search(&store, &config, &mut console, &term),
            Command::Show { name } => commands::show(&store, &config, &mut console, &name),
            Command::Edit { name, edits, yes } => {
                commands::edit(&store, &config, &mut console, &name, edits, yes)
            }
            Command::AddNext { name } => commands::add_next(&store, &config, &mut console, &name),
            Command::Remove { name, yes } => {
                commands::remove(&store, &config, &mut console, &name, yes)
            }
            Command::Init | Command::Config { .. } | Command::ClearDb { .. } => Ok(()),
        }),
    };

    match outcome {
        Err(err) if err.is_user_facing() => {
            eprintln!("{err}");
            std::process::exit(2);
        }
        Err(TrackerError::CorruptVolumes { name, reason }) => {
            eprintln!("Stored volumes for '{name}' are unreadable ({reason}); fix or remove the row.");
            std::process::exit(1);
        }
        other => Ok(other?),
    }
}
