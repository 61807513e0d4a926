use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use playlake_etl::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "playlake", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.config/playlake/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Build every output table from the input directory
    ///
    /// Reads song metadata from `<input>/song_data` and listening logs from
    /// `<input>/log_data`, then writes five Parquet tables under the output
    /// directory:
    ///
    /// - song_table, partitioned by year and artist_id
    /// - artists_table
    /// - user_table
    /// - time_table, partitioned by year and month
    /// - songplays_table, partitioned by year and month
    ///
    /// Each table replaces whatever a previous run left in its directory.
    /// A failing stage stops the run; tables written before the failure are
    /// kept.
    Run {
        /// Input directory holding song_data/ and log_data/
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output directory for the tables
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show which output tables exist and how they are laid out
    Status {
        /// Output directory to inspect
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Inspect or edit the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults if it does not exist
    Init,
    /// Print one value, or the whole file when no key is given
    Get {
        key: Option<String>,
    },
    /// Set one value in the config file
    Set {
        key: String,
        value: String,
    },
}

fn log_level(name: &str) -> Result<twyg::LogLevel> {
    let level = match name.to_ascii_lowercase().as_str() {
        "trace" => twyg::LogLevel::Trace,
        "debug" => twyg::LogLevel::Debug,
        "info" => twyg::LogLevel::Info,
        "warn" | "warning" => twyg::LogLevel::Warn,
        "error" => twyg::LogLevel::Error,
        other => anyhow::bail!("Unknown log level: {other}"),
    };
    Ok(level)
}

fn init_logging(config: &Config) -> Result<()> {
    let opts = twyg::OptsBuilder::new()
        .coloured(config.log_coloured)
        .level(log_level(&config.log_level)?)
        .build()
        .context("Invalid logging options")?;
    twyg::setup(opts).context("Failed to set up logging")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { input, output } => {
            let mut config = Config::load_from(config_path)?;
            if let Some(input) = input {
                config.input_dir = input;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            init_logging(&config)?;
            commands::run_pipeline(&config).await?;
        }
        Commands::Status { output } => {
            let mut config = Config::load_from(config_path)?;
            if let Some(output) = output {
                config.output_dir = output;
            }
            init_logging(&config)?;
            commands::show_status(&config.output_dir)?;
        }
        Commands::Config { action } => {
            let path = commands::config::resolve_path(config_path);
            match action {
                ConfigAction::Show => commands::config::show_config(&path)?,
                ConfigAction::Path => commands::config::show_path(&path),
                ConfigAction::Example => commands::config::show_example(),
                ConfigAction::Init => commands::config::init_config(&path)?,
                ConfigAction::Get { key } => commands::config::get_config(&path, key)?,
                ConfigAction::Set { key, value } => {
                    commands::config::set_config(&path, &key, &value)?;
                }
            }
        }
    }

    Ok(())
}
