use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spansh-galaxy-store")]
#[command(version, about = "Import Spansh galaxy dumps into SQLite and export them back out")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Show debug output
    #[arg(long, global = true, conflicts_with_all = ["verbose", "quiet"])]
    pub debug: bool,

    /// Show progress and summaries in the log
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// No progress bars and warnings only on failure
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database (overrides the configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database tables
    Init {
        /// Drop and recreate every table
        #[arg(short, long)]
        force: bool,
    },

    /// Import a local dump file (JSON array or NDJSON, optionally .gz)
    Import {
        /// Dump file to read
        input: PathBuf,

        /// Worker threads (default: configuration, then one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Download (if needed) and import a Spansh dataset
    Sync {
        /// Dataset name, e.g. galaxy_1day
        dataset: String,

        /// Force re-download even if cached
        #[arg(short, long)]
        force: bool,

        /// Worker threads
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Download a Spansh dataset into the cache
    Download {
        /// Dataset name, e.g. galaxy_1day
        dataset: String,

        /// Force re-download even if cached
        #[arg(short, long)]
        force: bool,

        /// Output directory (default: cache directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write stored systems as a dump file (.gz compresses)
    Export {
        output: PathBuf,

        /// Only these systems (repeatable)
        #[arg(short, long = "system", value_name = "ID64")]
        systems: Vec<u64>,
    },

    /// List table names in dependency order
    ListTables {
        /// Only these tables and the tables they depend on
        tables: Vec<String>,
    },

    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print one setting, e.g. `import.jobs`
    Get { key: String },

    /// Change one setting and save the file
    Set { key: String, value: String },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_with_globals() {
        let cli = Cli::try_parse_from([
            "spansh-galaxy-store",
            "import",
            "galaxy.json.gz",
            "--jobs",
            "4",
            "--database",
            "/tmp/g.sqlite3",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.global.verbose);
        assert_eq!(cli.global.database, Some(PathBuf::from("/tmp/g.sqlite3")));
        match cli.command {
            Commands::Import { input, jobs } => {
                assert_eq!(input, PathBuf::from("galaxy.json.gz"));
                assert_eq!(jobs, Some(4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_export_systems() {
        let cli = Cli::try_parse_from([
            "spansh-galaxy-store",
            "export",
            "out.json",
            "--system",
            "1",
            "-s",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Export { systems, .. } => assert_eq!(systems, vec![1, 2]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_verbosity_rejected() {
        assert!(Cli::try_parse_from(["spansh-galaxy-store", "--debug", "--quiet", "init"]).is_err());
    }

    #[test]
    fn test_config_set() {
        let cli = Cli::try_parse_from([
            "spansh-galaxy-store",
            "config",
            "set",
            "import.jobs",
            "8",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config { action: ConfigAction::Set { .. } }
        ));
    }
}
