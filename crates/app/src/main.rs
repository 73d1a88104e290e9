use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod settings;

use context::AppContext;
use settings::AppSettings;

#[derive(Parser)]
#[command(name = "mdassist")]
#[command(about = "AI writing assistant for the markdown editor", long_about = None)]
struct Cli {
    /// Directory holding the local stores (overrides settings and environment)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to the markdown backend
    Login {
        #[arg(long)]
        name: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and clear local session state
    Logout,
    /// Inspect or edit the AI provider configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// List the provider's models (cached for 15 minutes)
    Models {
        /// Bypass the cache
        #[arg(long)]
        refresh: bool,
    },
    /// Validate the configured base URL and API key
    Check,
    /// Ask the assistant
    Chat(commands::chat::ChatArgs),
    /// Show or clear the chat history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Show or change the editor theme
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Clear,
}

#[derive(Subcommand)]
enum ThemeAction {
    /// Light -> Dark -> System
    Cycle,
    /// light, dark or system
    Set { mode: String },
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = AppSettings::load()?;
    if let Some(dir) = cli.data_dir {
        settings.data_dir = Some(dir);
    }
    init_tracing(&settings.log_filter);

    let ctx = AppContext::open(&settings)?;

    match cli.command {
        Commands::Login { name, password } => commands::auth::login(&ctx, &name, password).await?,
        Commands::Logout => commands::auth::logout(&ctx).await?,
        Commands::Config { action } => commands::config::run(&ctx, action).await?,
        Commands::Models { refresh } => commands::models::list(&ctx, refresh).await?,
        Commands::Check => commands::models::check(&ctx).await?,
        Commands::Chat(args) => commands::chat::run(&ctx, args).await?,
        Commands::History { action } => match action {
            HistoryAction::List => commands::history::list(&ctx),
            HistoryAction::Clear => commands::history::clear(&ctx)?,
        },
        Commands::Theme { action } => match action {
            None => commands::theme::show(&ctx),
            Some(ThemeAction::Cycle) => commands::theme::cycle(&ctx)?,
            Some(ThemeAction::Set { mode }) => commands::theme::set(&ctx, &mode)?,
        },
    }

    Ok(())
}
