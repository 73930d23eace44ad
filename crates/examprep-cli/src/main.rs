//! examprep CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examprep", version, about = "Timed practice exams with analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create starter config and a sample question bank
    Init,

    /// Validate question bank TOML files
    Validate {
        /// Path to a bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Take a timed practice exam
    Practice {
        /// Static question bank to practice from
        #[arg(long, conflicts_with = "continuous")]
        bank: Option<PathBuf>,

        /// Generate questions one at a time instead of using a bank
        #[arg(long)]
        continuous: bool,

        /// Categories for continuous mode (comma-separated)
        #[arg(long)]
        categories: Option<String>,

        /// Time limit in minutes (defaults to the bank's, or 30)
        #[arg(long)]
        minutes: Option<f64>,

        /// Name stored with the attempt
        #[arg(long)]
        name: Option<String>,

        /// Record the attempt as a mock exam
        #[arg(long)]
        mock_exam: bool,

        /// Local attempt store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show performance analytics
    Analyze {
        /// Local attempt store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Reference date for streaks (YYYY-MM-DD, default: today UTC)
        #[arg(long)]
        today: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List past attempts
    History {
        /// Local attempt store file
        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        limit: u32,

        /// Sort field: completedAt, score, testName, timeSpent
        #[arg(long, default_value = "completedAt")]
        sort: String,

        /// Sort order: asc, desc
        #[arg(long, default_value = "desc")]
        order: String,

        /// Only show passed or failed attempts
        #[arg(long)]
        result: Option<String>,

        /// Show deleted attempts instead
        #[arg(long)]
        deleted: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Move an attempt to the trash
    Delete {
        id: String,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Restore a deleted attempt
    Restore {
        id: String,

        #[arg(long)]
        store: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examprep=info".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Practice {
            bank,
            continuous,
            categories,
            minutes,
            name,
            mock_exam,
            store,
            config,
        } => {
            commands::practice::execute(commands::practice::PracticeArgs {
                bank,
                continuous,
                categories,
                minutes,
                name,
                mock_exam,
                store,
                config,
            })
            .await
        }
        Commands::Analyze {
            store,
            today,
            format,
            config,
        } => commands::analyze::execute(store, today, format, config).await,
        Commands::History {
            store,
            page,
            limit,
            sort,
            order,
            result,
            deleted,
            config,
        } => {
            commands::history::list(commands::history::ListArgs {
                store,
                page,
                limit,
                sort,
                order,
                result,
                deleted,
                config,
            })
            .await
        }
        Commands::Delete { id, store, config } => {
            commands::history::delete(id, store, config).await
        }
        Commands::Restore { id, store, config } => {
            commands::history::restore(id, store, config).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
