//! ragchat CLI: the main entry point.
//!
//! Commands:
//! - `init`: write a default config file
//! - `ask`: answer one question against the configured index
//! - `gateway`: start the HTTP gateway
//! - `config`: show, locate, or validate the configuration

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "ragchat: retrieval-augmented chat over your documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write ~/.ragchat/config.toml with default values
    Init,

    /// Answer a single question
    Ask {
        /// The question
        question: String,

        /// Print the answer as it streams in
        #[arg(short, long)]
        stream: bool,

        /// Ask the model for follow-up questions
        #[arg(short, long)]
        followups: bool,

        /// Number of sources to retrieve
        #[arg(long)]
        top: Option<usize>,

        /// Retrieval strategy
        #[arg(long, value_enum)]
        retrieval_mode: Option<ModeArg>,

        /// Sampling temperature of the answer call
        #[arg(long)]
        temperature: Option<f32>,

        /// Print the retrieval thoughts after the answer
        #[arg(long)]
        thoughts: bool,

        /// Approach to answer with (default: `approach` from the config)
        #[arg(short, long, value_enum)]
        approach: Option<ApproachArg>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Text,
    Vectors,
    Hybrid,
}

impl From<ModeArg> for ragchat_config::RetrievalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Text => Self::Text,
            ModeArg::Vectors => Self::Vectors,
            ModeArg::Hybrid => Self::Hybrid,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ApproachArg {
    /// Multi-turn chat over text sources
    Text,
    /// Multi-turn chat over text and page images
    Vision,
    /// Single question, searched as asked
    Ask,
}

impl From<ApproachArg> for ragchat_config::ApproachKind {
    fn from(approach: ApproachArg) -> Self {
        match approach {
            ApproachArg::Text => Self::Text,
            ApproachArg::Vision => Self::Vision,
            ApproachArg::Ask => Self::Ask,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Ask {
            question,
            stream,
            followups,
            top,
            retrieval_mode,
            temperature,
            thoughts,
            approach,
        } => {
            let options = commands::ask::AskOptions {
                stream,
                show_thoughts: thoughts,
                approach: approach.map(Into::into),
                overrides: ragchat_config::ChatOverrides {
                    suggest_followup_questions: followups,
                    top,
                    retrieval_mode: retrieval_mode.map(Into::into),
                    temperature,
                    ..Default::default()
                },
            };
            commands::ask::run(question, options).await?
        }
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
