//! Top-level CLI definition and dispatch.

use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use serde_json::json;
use thiserror::Error;

use altius_test_watcher::core::config::Config;
use altius_test_watcher::core::errors::AtwError;
use altius_test_watcher::daemon::notifications::TelegramNotifier;
use altius_test_watcher::daemon::signals::ShutdownSignal;
use altius_test_watcher::daemon::watch_loop::{WatchDaemon, WatchTarget};
use altius_test_watcher::logger::activity::spawn_logger;
use altius_test_watcher::upstream::classify::classify;
use altius_test_watcher::upstream::client::{HttpStatusClient, StatusFetcher};

/// Altius Test Watcher — notifies a Telegram chat when a test result changes.
#[derive(Debug, Parser)]
#[command(
    name = "atw",
    author,
    version,
    about = "Altius Test Watcher - test result change notifier",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the watcher until a termination signal arrives.
    Watch(WatchArgs),
    /// Fetch and classify the current status once, without notifying.
    Check(CheckArgs),
    /// Show version information.
    Version,
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct WatchArgs {
    /// Altius retrieval code (env: ALTIUS_RETRIEVAL_CODE).
    #[arg(long, value_name = "CODE")]
    retrieval_code: Option<String>,
    /// Date of birth for the given code (env: ALTIUS_DATE_OF_BIRTH).
    #[arg(short = 'd', long, value_name = "DATE")]
    date_of_birth: Option<String>,
    /// Telegram bot token (env: TELEGRAM_TOKEN).
    #[arg(long, value_name = "TOKEN")]
    telegram_token: Option<String>,
    /// Telegram chat id to notify (env: TELEGRAM_CHAT_ID).
    #[arg(long, value_name = "ID", allow_hyphen_values = true)]
    telegram_chat_id: Option<i64>,
}

#[derive(Debug, Clone, Args, Default)]
struct CheckArgs {
    /// Altius retrieval code (env: ALTIUS_RETRIEVAL_CODE).
    #[arg(long, value_name = "CODE")]
    retrieval_code: Option<String>,
    /// Date of birth for the given code (env: ALTIUS_DATE_OF_BIRTH).
    #[arg(short = 'd', long, value_name = "DATE")]
    date_of_birth: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

/// CLI-level error wrapper; everything maps to exit code 1 in `main`.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AtwError),
}

/// Dispatch the parsed CLI.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Watch(args) => run_watch(cli, args),
        Command::Check(args) => run_check(cli, args),
        Command::Version => run_version(cli),
        Command::Completions(args) => run_completions(args),
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn run_watch(cli: &Cli, args: &WatchArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    if let Some(code) = &args.retrieval_code {
        config.watch.retrieval_code = code.clone();
    }
    if let Some(date) = &args.date_of_birth {
        config.watch.date_of_birth = date.clone();
    }
    if let Some(token) = &args.telegram_token {
        config.telegram.token = token.clone();
    }
    if let Some(chat_id) = args.telegram_chat_id {
        config.telegram.chat_id = chat_id;
    }
    config.validate_for_watch()?;

    let (logger, logger_join) = spawn_logger(config.paths.jsonl_log.clone())?;
    let shutdown = ShutdownSignal::install()?;
    let fetcher = HttpStatusClient::from_config(&config.upstream)?;
    let notifier = TelegramNotifier::from_config(&config.telegram)?;

    let mut daemon = WatchDaemon::new(
        WatchTarget {
            retrieval_code: config.watch.retrieval_code.clone(),
            date_of_birth: config.watch.date_of_birth.clone(),
        },
        config.telegram.chat_id,
        fetcher,
        notifier,
        shutdown,
        logger.clone(),
    );

    let outcome = daemon.run();

    logger.shutdown();
    let _ = logger_join.join();

    Ok(outcome?)
}

fn run_check(cli: &Cli, args: &CheckArgs) -> Result<(), CliError> {
    let mut config = load_config(cli)?;
    if let Some(code) = &args.retrieval_code {
        config.watch.retrieval_code = code.clone();
    }
    if let Some(date) = &args.date_of_birth {
        config.watch.date_of_birth = date.clone();
    }
    config.validate_for_check()?;

    let fetcher = HttpStatusClient::from_config(&config.upstream)?;
    let raw = fetcher.fetch(&config.watch.retrieval_code, &config.watch.date_of_birth)?;
    let status = classify(&raw)?;

    if cli.json {
        println!("{}", json!({ "status": status.to_string() }));
    } else {
        println!("{status}");
    }
    Ok(())
}

fn run_version(cli: &Cli) -> Result<(), CliError> {
    if cli.json {
        println!(
            "{}",
            json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            })
        );
    } else {
        println!("atw {}", env!("CARGO_PKG_VERSION"));
    }
    Ok(())
}

fn run_completions(args: &CompletionsArgs) -> Result<(), CliError> {
    generate(args.shell, &mut Cli::command(), "atw", &mut io::stdout());
    Ok(())
}
