//! Courtfetch CLI: entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use courtfetch::{CaseFilter, CaseKey};
use courtfetch_cli::commands::{self, FetchOptions};
use courtfetch_cli::config::{resolve_db_path, PortalOverrides};

#[derive(Parser)]
#[command(
    name = "courtfetch",
    about = "Fetch court case-status records through a human-assisted browser session",
    version
)]
struct Cli {
    /// Path to the query log database.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a case: from the log when a complete record exists, else live.
    ///
    /// A Chromium window opens with the search form filled in. Solve the
    /// CAPTCHA and submit; results are picked up automatically.
    Fetch {
        /// Case type code (see `courtfetch case-types`).
        case_type: String,
        case_number: String,
        case_year: String,

        /// Skip the log and always open the portal.
        #[arg(long)]
        fresh: bool,

        /// Seconds to wait for results after the form is filled.
        #[arg(long)]
        wait_timeout: Option<u64>,

        /// Seconds to keep the window open after a capture.
        #[arg(long)]
        linger: Option<u64>,

        /// Extra text that marks a rendered results table (repeatable).
        #[arg(long = "marker")]
        markers: Vec<String>,

        /// Chromium executable to use.
        #[arg(long)]
        chromium: Option<PathBuf>,
    },

    /// Every logged attempt for one case, most recent first.
    History {
        case_type: String,
        case_number: String,
        case_year: String,
    },

    /// Search the log; omitted fields match anything.
    Search {
        #[arg(long = "type")]
        case_type: Option<String>,
        #[arg(long = "number")]
        case_number: Option<String>,
        #[arg(long = "year")]
        case_year: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show one logged attempt.
    Show {
        id: i64,
        /// Print the raw page snapshot only.
        #[arg(long)]
        raw: bool,
    },

    /// Most recent attempts across all cases.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Totals and success rate over the log.
    Stats,

    /// List the accepted case type codes.
    CaseTypes,

    /// Run the extractor on a saved results page (HTML or text).
    Extract {
        file: PathBuf,
        case_type: String,
        case_number: String,
        case_year: String,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   courtfetch completions bash > ~/.local/share/bash-completion/completions/courtfetch
    ///   courtfetch completions zsh > ~/.zfunc/_courtfetch
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let db = resolve_db_path(cli.db.as_deref());
    let json = cli.json;

    match cli.command {
        Commands::Fetch {
            case_type,
            case_number,
            case_year,
            fresh,
            wait_timeout,
            linger,
            markers,
            chromium,
        } => {
            let key = commands::parse_key(&case_type, &case_number, &case_year)?;
            tracing::debug!("query log: {}", db.display());
            let opts = FetchOptions {
                fresh,
                chromium,
                portal: PortalOverrides {
                    wait_timeout_secs: wait_timeout,
                    linger_secs: linger,
                    markers,
                },
            };
            commands::fetch(&db, key, opts, json).await?;
        }

        Commands::History {
            case_type,
            case_number,
            case_year,
        } => {
            let key = CaseKey::new(case_type.trim(), case_number.trim(), case_year.trim());
            commands::history(&db, &key, json)?;
        }

        Commands::Search {
            case_type,
            case_number,
            case_year,
            limit,
        } => {
            let filter = CaseFilter {
                case_type,
                case_number,
                case_year,
                limit,
            };
            commands::search(&db, &filter, json)?;
        }

        Commands::Show { id, raw } => commands::show(&db, id, raw, json)?,

        Commands::Recent { limit } => commands::recent(&db, limit, json)?,

        Commands::Stats => commands::stats(&db, json)?,

        Commands::CaseTypes => commands::case_types(json)?,

        Commands::Extract {
            file,
            case_type,
            case_number,
            case_year,
        } => {
            let key = CaseKey::new(case_type.trim(), case_number.trim(), case_year.trim());
            commands::extract_file(&file, &key, json)?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "courtfetch", &mut std::io::stdout());
        }
    }

    Ok(())
}
