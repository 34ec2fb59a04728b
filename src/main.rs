use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use medfetch::batch::{BatchConfig, BatchFetcher, BatchResult, CancellationFlag};
use medfetch::config::{
    default_config_path, find_config_file, load_config, save_config, Config, CONFIG_FILE_NAME,
};
use medfetch::models::{AffiliationQuery, MatchedPublication};
use medfetch::pipeline::{search_affiliation_with, SearchEvent, SearchOutcome};
use medfetch::render::{self, Format};
use medfetch::sources::PubMedClient;
use medfetch::ui::{print_status, Spinner, Status};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// medfetch - Find recent PubMed publications by author affiliation
#[derive(Parser, Debug)]
#[command(name = "medfetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find recent PubMed publications by author affiliation", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Show supported environment variables
    #[arg(long)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Table on a terminal, JSON otherwise
    Auto,
    /// Table format (human-readable)
    Table,
    /// Plain text format
    Plain,
    /// JSON format (machine-readable)
    Json,
    /// HTML fragments
    Html,
}

impl OutputFormat {
    fn resolve(self) -> Format {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => Format::Table,
            OutputFormat::Auto => Format::Json,
            OutputFormat::Table => Format::Table,
            OutputFormat::Plain => Format::Plain,
            OutputFormat::Json => Format::Json,
            OutputFormat::Html => Format::Html,
        }
    }
}

/// Batch tuning flags shared by `search` and `fetch`
#[derive(clap::Args, Debug, Clone, Copy)]
struct BatchArgs {
    /// Maximum concurrent record fetches
    #[arg(long, short = 'c')]
    concurrency: Option<usize>,

    /// Minimum delay between fetches on one worker, in milliseconds
    #[arg(long)]
    spacing_ms: Option<u64>,
}

impl BatchArgs {
    fn apply(self, config: BatchConfig) -> BatchConfig {
        BatchConfig {
            max_concurrency: self.concurrency.unwrap_or(config.max_concurrency),
            min_spacing_ms: self.spacing_ms.unwrap_or(config.min_spacing_ms),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search recent publications by author affiliation
    #[command(alias = "s")]
    Search {
        /// Institution name, e.g. "MIT, Cambridge"
        affiliation: String,

        /// Number of weeks back from today to search
        #[arg(long, short, default_value_t = 1)]
        weeks: u32,

        /// Maximum number of records to retrieve
        #[arg(long, short)]
        max_results: Option<usize>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Fetch specific records by PMID
    #[command(alias = "f")]
    Fetch {
        /// PubMed identifiers
        #[arg(required = true)]
        ids: Vec<String>,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination (default: user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Print all supported environment variables
fn print_env_vars() {
    println!("medfetch - Environment Variables");
    println!();
    println!("API Keys:");
    println!("  NCBI_API_KEY                          NCBI API key (raises the upstream rate limit)");
    println!();
    println!("PubMed:");
    println!("  MEDFETCH__PUBMED__SEARCH_URL          ESearch endpoint");
    println!("  MEDFETCH__PUBMED__FETCH_URL           EFetch endpoint or compatible proxy");
    println!("  MEDFETCH__PUBMED__MAX_RESULTS         Maximum identifiers per search (default: 100)");
    println!();
    println!("Batch Fetching:");
    println!("  MEDFETCH__BATCH__MAX_CONCURRENCY      Concurrent record fetches (default: 10)");
    println!("  MEDFETCH__BATCH__MIN_SPACING_MS       Delay between fetches per worker (default: 100)");
    println!();
    println!("HTTP:");
    println!("  MEDFETCH__HTTP__TIMEOUT_SECS          Request timeout (default: 30)");
    println!();
    println!("Other Settings:");
    println!("  MEDFETCH__LOGGING__FORMAT             \"json\" for structured logs");
    println!("  RUST_LOG                              Rust logging level (e.g., debug, info, warn, error)");
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("medfetch={}", level)));
    let json = config.logging.is_json();

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// Cancel `flag` on Ctrl-C so workers stop after their in-flight fetch
fn cancel_on_ctrl_c() -> CancellationFlag {
    let flag = CancellationFlag::new();
    let trigger = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight requests");
            trigger.cancel();
        }
    });
    flag
}

/// Batch fetcher that advances `progress` and stops on Ctrl-C
fn progress_fetcher(
    client: Arc<PubMedClient>,
    config: BatchConfig,
    progress: &Spinner,
) -> BatchFetcher<Arc<PubMedClient>> {
    let handle = progress.handle();
    BatchFetcher::new(client, config)
        .with_cancellation(cancel_on_ctrl_c())
        .with_progress(move |completed, _| handle.set_position(completed as u64))
}

fn report_batch(result: &BatchResult, quiet: bool) {
    if !quiet && !result.failed.is_empty() {
        print_status(
            Status::Warning,
            &format!("{} record(s) could not be retrieved", result.failed.len()),
        );
    }
    if result.cancelled {
        print_status(
            Status::Warning,
            &format!("Cancelled, {} record(s) not fetched", result.skipped.len()),
        );
    }
}

fn print_outcome(
    outcome: &SearchOutcome,
    query: &AffiliationQuery,
    format: Format,
    quiet: bool,
) -> Result<()> {
    match format {
        Format::Html => println!("{}", render::render_html(outcome, query)),
        Format::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        Format::Table | Format::Plain => {
            if !quiet {
                let status = match outcome {
                    SearchOutcome::Matches { .. } => Status::Success,
                    SearchOutcome::NoAffiliationMatch { .. } => Status::Warning,
                    SearchOutcome::NoResults => Status::Info,
                };
                print_status(status, &render::outcome_message(outcome, query));
            }
            if !outcome.publications().is_empty() {
                println!("{}", render::render_publications(outcome.publications(), format)?);
            }
        }
    }
    Ok(())
}

fn print_failure(error: &dyn std::fmt::Display, format: Format) {
    match format {
        Format::Html => println!("{}", render::render_html_error(error)),
        _ => print_status(Status::Error, &render::failure_message(error)),
    }
}

async fn run_search(
    cli: &Cli,
    config: &Config,
    affiliation: &str,
    weeks: u32,
    max_results: Option<usize>,
    batch: BatchArgs,
) -> Result<ExitCode> {
    let format = cli.output.resolve();
    let client =
        Arc::new(PubMedClient::from_config(config).context("Failed to create HTTP client")?);
    let query = AffiliationQuery::new(affiliation)
        .window_weeks(weeks)
        .max_results(max_results.unwrap_or(config.pubmed.max_results));

    let spinner = Spinner::new(&format!("Searching PubMed for \"{}\"", query.affiliation));
    let fetcher = progress_fetcher(Arc::clone(&client), batch.apply(config.batch), &spinner);

    let result = search_affiliation_with(client.as_ref(), &fetcher, &query, |event| match event {
        SearchEvent::Found(found) => spinner.start_bar(
            found as u64,
            &format!("Found {} publications. Fetching details", found),
        ),
        SearchEvent::Fetched(fetched) => {
            spinner.clear();
            report_batch(fetched, cli.quiet);
        }
    })
    .await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.finish_with_error("Search failed");
            tracing::error!(error = %e, "PubMed search failed");
            print_failure(&e, format);
            return Ok(ExitCode::FAILURE);
        }
    };
    spinner.clear();

    print_outcome(&outcome, &query, format, cli.quiet)?;
    Ok(ExitCode::SUCCESS)
}

async fn run_fetch(
    cli: &Cli,
    config: &Config,
    ids: &[String],
    batch: BatchArgs,
) -> Result<ExitCode> {
    let format = cli.output.resolve();
    let client =
        Arc::new(PubMedClient::from_config(config).context("Failed to create HTTP client")?);

    let bar = Spinner::bar(ids.len() as u64, "Fetching details");
    let result = progress_fetcher(client, batch.apply(config.batch), &bar)
        .fetch_all(ids)
        .await;
    bar.clear();
    report_batch(&result, cli.quiet);

    let publications: Vec<MatchedPublication> = result
        .records
        .into_iter()
        .map(|record| MatchedPublication {
            matched_authors: record.authors.clone(),
            record,
        })
        .collect();

    if publications.is_empty() {
        print_status(Status::Error, "No records could be retrieved");
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", render::render_publications(&publications, format)?);
    Ok(ExitCode::SUCCESS)
}

fn run_init_config(path: Option<PathBuf>, force: bool) -> Result<ExitCode> {
    let path = path
        .or_else(default_config_path)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    save_config(&Config::default(), &path)?;
    print_status(Status::Success, &format!("Wrote {}", path.display()));
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
        return Ok(ExitCode::SUCCESS);
    }

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    let mut config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(timeout) = cli.timeout {
        config.http.timeout_secs = timeout;
    }

    init_tracing(&cli, &config);
    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match &cli.command {
        Some(Commands::Search {
            affiliation,
            weeks,
            max_results,
            batch,
        }) => run_search(&cli, &config, affiliation, *weeks, *max_results, *batch).await,
        Some(Commands::Fetch { ids, batch }) => run_fetch(&cli, &config, ids, *batch).await,
        Some(Commands::InitConfig { path, force }) => run_init_config(path.clone(), *force),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["medfetch"]);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Auto);
        assert!(cli.timeout.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::parse_from(["medfetch", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_search_command() {
        let cli = Cli::parse_from(["medfetch", "search", "MIT, Cambridge"]);
        match cli.command {
            Some(Commands::Search {
                affiliation,
                weeks,
                max_results,
                batch,
            }) => {
                assert_eq!(affiliation, "MIT, Cambridge");
                assert_eq!(weeks, 1);
                assert!(max_results.is_none());
                assert!(batch.concurrency.is_none());
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_with_options() {
        let cli = Cli::parse_from([
            "medfetch",
            "search",
            "Broad Institute",
            "--weeks",
            "4",
            "-c",
            "3",
            "--spacing-ms",
            "250",
            "-o",
            "html",
        ]);
        assert_eq!(cli.output, OutputFormat::Html);
        match cli.command {
            Some(Commands::Search { weeks, batch, .. }) => {
                assert_eq!(weeks, 4);
                let applied = batch.apply(BatchConfig::default());
                assert_eq!(applied, BatchConfig::new(3, 250));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_fetch_command() {
        let cli = Cli::parse_from(["medfetch", "fetch", "101", "102"]);
        match cli.command {
            Some(Commands::Fetch { ids, batch }) => {
                assert_eq!(ids, vec!["101", "102"]);
                assert_eq!(batch.apply(BatchConfig::new(5, 50)), BatchConfig::new(5, 50));
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_fetch_requires_ids() {
        assert!(Cli::try_parse_from(["medfetch", "fetch"]).is_err());
    }

    #[test]
    fn test_output_format_resolution() {
        assert_eq!(OutputFormat::Plain.resolve(), Format::Plain);
        assert_eq!(OutputFormat::Html.resolve(), Format::Html);
        assert_eq!(OutputFormat::Json.resolve(), Format::Json);
    }
}
