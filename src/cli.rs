use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::listing::ListFilter;
use crate::series::EditCommand;
use crate::store::SortField;

#[derive(Parser)]
#[command(name = "mangatracker")]
#[command(about = "Track which volumes of each manga series you own", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Config file (created with defaults if missing)
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub(crate) config: PathBuf,
    /// More log output (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub(crate) quiet: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Create the database named in the config.
    Init,

    /// Add a new series.
    Add(AddArgs),

    /// List series, optionally filtered and sorted.
    List {
        #[arg(short, long, value_enum, default_value_t = ListFilter::All)]
        filter: ListFilter,
        #[arg(short, long, value_enum, default_value_t = SortOrder::Name)]
        order: SortOrder,
    },

    /// Find series by name, author, publisher or alternate names.
    Search { term: String },

    /// Show the full description of one series.
    Show { name: String },

    /// Edit a series. Without --set, prompts for changes interactively.
    Edit {
        name: String,
        /// FIELD=VALUE edits applied in order: name, add, remove, author, publisher, alt,
        /// completed, end
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        edits: Vec<EditCommand>,
        /// Answer yes to confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },

    /// Mark the next missing volume of a series as owned.
    AddNext { name: String },

    /// Remove a series from the database.
    Remove {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or change settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Move the database aside to <name>.bak and start an empty one.
    ClearDb {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args)]
pub(crate) struct AddArgs {
    pub(crate) name: String,
    /// Volumes owned, e.g. "1, 3-5, 7"
    #[arg(long, default_value = "")]
    pub(crate) volumes: String,
    #[arg(long)]
    pub(crate) author: Option<String>,
    #[arg(long)]
    pub(crate) publisher: Option<String>,
    #[arg(long)]
    pub(crate) alt_names: Option<String>,
    /// All volumes of the series are owned
    #[arg(long)]
    pub(crate) completed: bool,
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Print every setting.
    Show,
    /// Change one setting.
    Set { key: String, value: String },
    /// Restore the defaults.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SortOrder {
    Name,
    Author,
    Publisher,
    AltNames,
}

impl From<SortOrder> for SortField {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Name => SortField::Name,
            SortOrder::Author => SortField::Author,
            SortOrder::Publisher => SortField::Publisher,
            SortOrder::AltNames => SortField::AltNames,
        }
    }
}
