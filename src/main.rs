use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lessonloom::cli::commands::{cache, config, generate};
use lessonloom::types::{ContentType, Level};

fn parse_level(s: &str) -> Result<Level, String> {
    s.parse()
}

fn parse_content_type(s: &str) -> Result<ContentType, String> {
    s.parse()
}

#[derive(Parser)]
#[command(name = "lessonloom")]
#[command(version, about = "AI-driven generator for paginated, cached lessons")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the global/project chain
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a lesson for a topic
    Generate {
        #[arg(help = "Topic or question to teach")]
        prompt: String,
        #[arg(long, short, value_parser = parse_level, help = "school-kid, high-school, undergraduate, expert")]
        level: Option<Level>,
        #[arg(long = "content-type", short = 't', value_parser = parse_content_type, help = "concise, detailed")]
        content_type: Option<ContentType>,
        #[arg(long, short, help = "Directory to export content.json, pages and quizzes into")]
        output: Option<PathBuf>,
        #[arg(long = "no-cache", help = "Ignore cached artifacts (fresh results are still cached)")]
        no_cache: bool,
        #[arg(long, help = "Pages generated concurrently")]
        concurrency: Option<usize>,
    },

    /// Inspect or clear the content cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show usage against capacity
    Info {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// List cached keys
    Keys {
        #[arg(long, short, help = "Only keys starting with this prefix")]
        prefix: Option<String>,
    },
    /// Remove cached entries
    Clear {
        #[arg(long, short, help = "Only keys starting with this prefix")]
        prefix: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mlessonloom encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Generate {
            prompt,
            level,
            content_type,
            output,
            no_cache,
            concurrency,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(generate::run(generate::GenerateOptions {
                prompt,
                level,
                content_type,
                output,
                no_cache,
                concurrency,
                config_path: cli.config.clone(),
                quiet: cli.quiet,
            }))?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Info { json } => cache::info(config_path, json)?,
            CacheAction::Keys { prefix } => cache::keys(config_path, prefix.as_deref())?,
            CacheAction::Clear { prefix } => cache::clear(config_path, prefix.as_deref())?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { global, json } => config::show(global, json)?,
            ConfigAction::Path => config::path()?,
            ConfigAction::Init { global, force } => config::init(global, force)?,
        },
    }

    Ok(())
}
