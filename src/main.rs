//! jsripple main entry point
//!
//! This is the command-line interface for the jsripple endpoint discovery engine.

use anyhow::{bail, Context};
use clap::Parser;
use jsripple::config::{load_config_with_hash, parse_duration, validate, Config, HeaderEntry};
use jsripple::crawler::{CrawlOrchestrator, Target};
use jsripple::input::resolve_targets;
use jsripple::output::{print_statistics, print_summary, CliOutput};
use jsripple::tagging::{self, Rule};
use jsripple::TaggingError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: jsripple [OPTIONS] --input <INPUT>";

/// jsripple: concurrent JavaScript endpoint discovery
///
/// jsripple fetches pages and scripts, extracts endpoint-like string
/// literals from their source, and can recursively follow the scripts and
/// sitemaps they reference.
#[derive(Parser, Debug)]
#[command(name = "jsripple")]
#[command(version = "1.0.0")]
#[command(about = "Concurrent JavaScript endpoint discovery", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// URL, file, wildcard (e.g. 'static/*.js') or Burp export; repeatable
    #[arg(short, long = "input", value_name = "INPUT")]
    input: Vec<String>,

    /// Recursively analyse scripts and sitemaps referenced by each input
    #[arg(short, long)]
    domain: bool,

    /// Only follow resources on this host
    #[arg(short, long)]
    scope: Option<String>,

    /// Also follow subdomains of the scope host
    #[arg(long)]
    scope_include_subdomains: bool,

    /// Only report endpoints matching this regular expression (e.g. ^/api/)
    #[arg(short, long)]
    regex: Option<String>,

    /// Treat inputs as Burp Suite XML exports
    #[arg(short, long)]
    burp: bool,

    /// Cookie header for authenticated resources
    #[arg(short, long)]
    cookies: Option<String>,

    /// Proxy URL for every request
    #[arg(long)]
    proxy: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Per-request timeout, in seconds or with a unit (e.g. 2.5, 10s, 500ms, 1m)
    #[arg(short, long, value_name = "DURATION", value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// Maximum recursion depth (0 means unlimited)
    #[arg(long)]
    max_depth: Option<u32>,

    /// Capture the source line around each endpoint
    #[arg(long)]
    context: bool,

    /// Render pages in a headless browser (requires the `browser` feature)
    #[arg(long)]
    render: bool,

    /// Extra request header as 'Name: value'; repeatable
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Script extensions to follow, comma separated
    #[arg(long = "script-ext", value_delimiter = ',')]
    script_extensions: Vec<String>,

    /// gf rules to apply to endpoints, comma separated, or 'all'
    #[arg(long = "gf", value_delimiter = ',')]
    gf_rules: Vec<String>,

    /// Directory holding gf rules (default: ~/.gf)
    #[arg(long)]
    gf_dir: Option<String>,

    /// Also write gf findings as JSON to this path
    #[arg(long, value_name = "PATH")]
    gf_json: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be analysed without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        eprintln!("{}", USAGE);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = build_config(&cli)?;
    validate(&config)?;

    let targets = resolve_targets(&config.inputs, config.burp)?;
    tracing::info!("Resolved {} targets", targets.len());

    let rules = load_tagging_rules(&config)?;

    if cli.dry_run {
        handle_dry_run(&config, &targets, rules.as_deref());
        return Ok(());
    }

    handle_crawl(&config, targets, rules, cli.verbose, cli.gf_json.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so the report on stdout stays clean.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("jsripple=info,warn"),
            1 => EnvFilter::new("jsripple=debug,info"),
            2 => EnvFilter::new("jsripple=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the optional config file and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::debug!("Configuration loaded (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if !cli.input.is_empty() {
        config.inputs = cli.input.clone();
    }
    config.burp |= cli.burp;

    config.crawl.recursive |= cli.domain;
    config.crawl.scope_include_subdomains |= cli.scope_include_subdomains;
    if cli.scope.is_some() {
        config.crawl.scope = cli.scope.clone();
    }
    if let Some(workers) = cli.workers {
        config.crawl.workers = workers;
    }
    if let Some(max_depth) = cli.max_depth {
        config.crawl.max_depth = max_depth;
    }
    if !cli.script_extensions.is_empty() {
        config.crawl.script_extensions = cli.script_extensions.clone();
    }

    if let Some(timeout) = cli.timeout {
        config.fetch.timeout_secs = timeout.as_secs_f64();
    }
    if cli.proxy.is_some() {
        config.fetch.proxy = cli.proxy.clone();
    }
    if cli.cookies.is_some() {
        config.fetch.cookies = cli.cookies.clone();
    }
    config.fetch.insecure |= cli.insecure;
    config.fetch.render |= cli.render;
    for raw in &cli.headers {
        match HeaderEntry::parse(raw) {
            Some(header) => config.fetch.headers.push(header),
            None => bail!("invalid header {:?}, expected 'Name: value'", raw),
        }
    }

    if cli.regex.is_some() {
        config.extract.regex = cli.regex.clone();
    }
    config.extract.context |= cli.context;

    if !cli.gf_rules.is_empty() {
        config.tagging.rules = cli.gf_rules.clone();
    }
    if cli.gf_dir.is_some() {
        config.tagging.dir = cli.gf_dir.clone();
    }

    Ok(config)
}

/// Loads gf rules if any were requested
fn load_tagging_rules(config: &Config) -> anyhow::Result<Option<Vec<Rule>>> {
    if !config.tagging.is_enabled() {
        return Ok(None);
    }

    let dir = match &config.tagging.dir {
        Some(dir) => PathBuf::from(dir),
        None => tagging::default_dir()
            .ok_or_else(|| TaggingError::MissingDirectory("~/.gf".to_string()))?,
    };

    let rules = tagging::load_rules(&dir, &config.tagging.rules, config.tagging.use_all())?;
    tracing::info!("Loaded gf rules: {}", tagging::rule_names(&rules).join(", "));
    Ok(Some(rules))
}

/// Handles the --dry-run mode: shows what would be analysed
fn handle_dry_run(config: &Config, targets: &[Target], rules: Option<&[Rule]>) {
    println!("=== jsripple Dry Run ===\n");

    println!("Crawl Configuration:");
    println!("  Recursive: {}", config.crawl.recursive);
    println!("  Max depth: {}", config.crawl.depth());
    println!("  Workers: {}", config.crawl.workers);
    println!(
        "  Scope: {}{}",
        config.crawl.scope.as_deref().unwrap_or("(none)"),
        if config.crawl.scope_include_subdomains {
            " (including subdomains)"
        } else {
            ""
        }
    );
    println!("  Script extensions: {}", config.crawl.script_extensions.join(" "));

    println!("\nFetch:");
    println!("  Timeout: {:?}", config.fetch.timeout());
    println!("  Proxy: {}", config.fetch.proxy.as_deref().unwrap_or("(none)"));
    println!("  Insecure: {}", config.fetch.insecure);
    println!("  Render: {}", config.fetch.render);
    for header in &config.fetch.headers {
        println!("  Header: {}: {}", header.name, header.value);
    }

    println!("\nExtraction:");
    println!("  Filter: {}", config.extract.regex.as_deref().unwrap_or("(none)"));
    println!("  Context: {}", config.extract.context);

    if let Some(rules) = rules {
        println!("\ngf rules: {}", tagging::rule_names(rules).join(", "));
    }

    println!("\nTargets ({}):", targets.len());
    for target in targets {
        if target.prefetched {
            println!("  - {} (prefetched, {} bytes)", target.url, target.content.len());
        } else {
            println!("  - {}", target.url);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    targets: Vec<Target>,
    rules: Option<Vec<Rule>>,
    verbose: u8,
    gf_json: Option<&Path>,
) -> anyhow::Result<()> {
    let orchestrator = CrawlOrchestrator::new(config)?.with_handler(Arc::new(CliOutput::stdout()));
    let outcome = orchestrator.run(targets).await?;

    print_summary(&outcome.metadata)?;
    if verbose > 0 {
        print_statistics(&outcome.statistics)?;
    }

    if let Some(rules) = rules {
        let names = tagging::rule_names(&rules);
        let findings = tagging::find_in_reports(&outcome.reports, &rules);

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        tagging::write_findings(&mut out, &names, &findings)?;
        out.flush()?;

        if let Some(path) = gf_json {
            let json = tagging::findings_to_json(outcome.metadata.generated_at, &names, &findings)?;
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!("gf findings written to {}", path.display());
        }
    }

    Ok(())
}
